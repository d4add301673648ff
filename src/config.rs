//! Operator configuration
//!
//! Settings come from command-line flags with environment-variable fallbacks
//! and are validated once at startup into an [`OperatorConfig`].

use std::time::Duration;

use clap::{ArgAction, Args};

use crate::crd::{GatewayClass, ObjectRef};
use crate::provider::ProviderKind;
use crate::{Error, DEFAULT_NAMESPACE_LABEL};

/// Default namespace of the shared gateways
pub const DEFAULT_GATEWAY_NAMESPACE: &str = "gateway-system";
/// Default name of the internet-facing gateway
pub const DEFAULT_PUBLIC_GATEWAY: &str = "public-gateway";
/// Default name of the internal gateway
pub const DEFAULT_INTERNAL_GATEWAY: &str = "internal-gateway";
/// Default per-reconcile deadline
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 120;

/// Flags for `portico controller`
#[derive(Args, Debug, Clone)]
pub struct ControllerArgs {
    /// Namespace holding the shared gateways
    #[arg(long, env = "PORTICO_GATEWAY_NAMESPACE", default_value = DEFAULT_GATEWAY_NAMESPACE)]
    pub gateway_namespace: String,

    /// Gateway used for `gateway: public`
    #[arg(long, env = "PORTICO_PUBLIC_GATEWAY", default_value = DEFAULT_PUBLIC_GATEWAY)]
    pub public_gateway: String,

    /// Gateway used for `gateway: internal`
    #[arg(long, env = "PORTICO_INTERNAL_GATEWAY", default_value = DEFAULT_INTERNAL_GATEWAY)]
    pub internal_gateway: String,

    /// Namespace label that must be "true" for onboarding to proceed
    #[arg(long, env = "PORTICO_NAMESPACE_LABEL", default_value = DEFAULT_NAMESPACE_LABEL)]
    pub namespace_label: String,

    /// Identity providers AppOnboardings may select
    #[arg(
        long,
        env = "PORTICO_PROVIDERS",
        value_enum,
        value_delimiter = ',',
        default_values_t = [ProviderKind::Keycloak, ProviderKind::GenericOidc]
    )]
    pub providers: Vec<ProviderKind>,

    /// Keycloak base URL used for admin API calls
    #[arg(long, env = "KEYCLOAK_URL")]
    pub keycloak_url: Option<String>,

    /// Browser-facing Keycloak base URL used in issuer URLs (defaults to --keycloak-url)
    #[arg(long, env = "KEYCLOAK_ISSUER_BASE_URL")]
    pub keycloak_issuer_base_url: Option<String>,

    /// Realm OIDC clients are registered in
    #[arg(long, env = "KEYCLOAK_REALM", default_value = "portico")]
    pub keycloak_realm: String,

    /// Secret holding Keycloak admin credentials
    #[arg(long, env = "KEYCLOAK_ADMIN_SECRET", default_value = "keycloak-admin")]
    pub keycloak_admin_secret: String,

    /// Namespace of the Keycloak admin credentials secret
    #[arg(long, env = "KEYCLOAK_ADMIN_SECRET_NAMESPACE", default_value = "portico-system")]
    pub keycloak_admin_secret_namespace: String,

    /// Admin username used when the credentials secret is absent
    #[arg(long, env = "KEYCLOAK_ADMIN_USER")]
    pub keycloak_admin_user: Option<String>,

    /// Admin password used when the credentials secret is absent
    #[arg(long, env = "KEYCLOAK_ADMIN_PASSWORD", hide_env_values = true)]
    pub keycloak_admin_password: Option<String>,

    /// Deadline for a single reconcile pass, in seconds
    #[arg(long, env = "PORTICO_RECONCILE_TIMEOUT_SECS", default_value_t = DEFAULT_RECONCILE_TIMEOUT_SECS)]
    pub reconcile_timeout_secs: u64,

    /// Replica name reported on Events, normally the pod name
    #[arg(long, env = "POD_NAME")]
    pub instance: Option<String>,

    /// Install or upgrade the AppOnboarding CRD on startup
    #[arg(long, env = "PORTICO_INSTALL_CRD", default_value_t = true, action = ArgAction::Set)]
    pub install_crd: bool,
}

/// Shared gateway locations
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Namespace of both gateways
    pub namespace: String,
    /// Internet-facing gateway name
    pub public: String,
    /// Internal gateway name
    pub internal: String,
}

impl GatewayConfig {
    /// Resolve a gateway selector to a concrete Gateway
    pub fn gateway_for(&self, class: GatewayClass) -> ObjectRef {
        let name = match class {
            GatewayClass::Public => &self.public,
            GatewayClass::Internal => &self.internal,
        };
        ObjectRef::new(name.clone(), self.namespace.clone())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_GATEWAY_NAMESPACE.to_string(),
            public: DEFAULT_PUBLIC_GATEWAY.to_string(),
            internal: DEFAULT_INTERNAL_GATEWAY.to_string(),
        }
    }
}

/// Keycloak connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeycloakConfig {
    /// Admin API base URL, without trailing slash
    pub url: String,
    /// Issuer base URL, without trailing slash
    pub issuer_base_url: String,
    /// Realm clients are registered in
    pub realm: String,
    /// Admin credentials secret
    pub admin_secret: ObjectRef,
    /// Fallback admin username
    pub fallback_username: Option<String>,
    /// Fallback admin password
    pub fallback_password: Option<String>,
}

impl KeycloakConfig {
    /// Issuer URL of the client realm
    pub fn issuer_url(&self) -> String {
        format!("{}/realms/{}", self.issuer_base_url, self.realm)
    }
}

/// Validated operator configuration
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Shared gateways
    pub gateways: GatewayConfig,
    /// Namespace opt-in label key
    pub namespace_label: String,
    /// Enabled identity providers
    pub providers: Vec<ProviderKind>,
    /// Keycloak settings, present when Keycloak is enabled
    pub keycloak: Option<KeycloakConfig>,
    /// Deadline for a single reconcile pass
    pub reconcile_timeout: Duration,
    /// Replica name reported on Events
    pub instance: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            gateways: GatewayConfig::default(),
            namespace_label: DEFAULT_NAMESPACE_LABEL.to_string(),
            providers: vec![ProviderKind::GenericOidc],
            keycloak: None,
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            instance: None,
        }
    }
}

impl OperatorConfig {
    /// Validate command-line arguments into a configuration
    pub fn from_args(args: &ControllerArgs) -> Result<Self, Error> {
        let mut providers = args.providers.clone();
        providers.sort();
        providers.dedup();
        if providers.is_empty() {
            return Err(Error::config("at least one identity provider must be enabled"));
        }

        let keycloak = if providers.contains(&ProviderKind::Keycloak) {
            Some(keycloak_config(args)?)
        } else {
            None
        };

        if args.reconcile_timeout_secs == 0 {
            return Err(Error::config("reconcile timeout must be positive"));
        }

        Ok(Self {
            gateways: GatewayConfig {
                namespace: args.gateway_namespace.clone(),
                public: args.public_gateway.clone(),
                internal: args.internal_gateway.clone(),
            },
            namespace_label: args.namespace_label.clone(),
            providers,
            keycloak,
            reconcile_timeout: Duration::from_secs(args.reconcile_timeout_secs),
            instance: args.instance.clone(),
        })
    }
}

fn keycloak_config(args: &ControllerArgs) -> Result<KeycloakConfig, Error> {
    let url = args
        .keycloak_url
        .as_deref()
        .map(normalize_url)
        .transpose()?
        .ok_or_else(|| Error::config("keycloak provider enabled but KEYCLOAK_URL is not set"))?;
    let issuer_base_url = match args.keycloak_issuer_base_url.as_deref() {
        Some(issuer) => normalize_url(issuer)?,
        None => url.clone(),
    };

    Ok(KeycloakConfig {
        url,
        issuer_base_url,
        realm: args.keycloak_realm.clone(),
        admin_secret: ObjectRef::new(
            args.keycloak_admin_secret.clone(),
            args.keycloak_admin_secret_namespace.clone(),
        ),
        fallback_username: args.keycloak_admin_user.clone(),
        fallback_password: args.keycloak_admin_password.clone(),
    })
}

fn normalize_url(raw: &str) -> Result<String, Error> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::config(format!(
            "'{raw}' is not an http(s) URL"
        )));
    }
    Ok(trimmed.to_string())
}
