//! Deterministic names for everything derived from an AppOnboarding
//!
//! Names are a pure function of the AppOnboarding's name and namespace so a
//! reconcile pass can always find the objects a previous pass created.

/// Key holding the OIDC client secret inside the credential Secret
pub const CLIENT_SECRET_KEY: &str = "client-secret";

/// Path the gateway's OAuth2 filter serves the callback on
pub const CALLBACK_PATH: &str = "/oauth2/callback";

/// Name of the HTTPRoute for an AppOnboarding
pub fn route_name(name: &str) -> String {
    format!("{name}-route")
}

/// Name of the SecurityPolicy for an AppOnboarding
pub fn security_policy_name(name: &str) -> String {
    format!("{name}-security")
}

/// Name of the Secret holding the OIDC client secret
pub fn client_secret_name(name: &str) -> String {
    format!("{name}-oidc-client")
}

/// OIDC client identifier registered in the identity provider.
///
/// Namespaces are DNS labels and cannot contain dots, so joining on `.`
/// keeps identifiers unique across namespaces.
pub fn client_id(namespace: &str, name: &str) -> String {
    format!("{namespace}.{name}")
}

/// Default OAuth2 redirect URL for a hostname
pub fn redirect_url(hostname: &str, tls: bool) -> String {
    format!("{}{CALLBACK_PATH}", origin(hostname, tls))
}

/// Browser origin for a hostname
pub fn origin(hostname: &str, tls: bool) -> String {
    let scheme = if tls { "https" } else { "http" };
    format!("{scheme}://{hostname}")
}
