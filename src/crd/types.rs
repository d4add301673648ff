//! Supporting types for the AppOnboarding CRD

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which shared gateway fronts the application
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayClass {
    /// Internet-facing gateway
    #[default]
    Public,
    /// Cluster/VPN-internal gateway
    Internal,
}

impl std::fmt::Display for GatewayClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// How a route path is matched
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathMatchType {
    /// Match the path and everything below it
    #[default]
    Prefix,
    /// Match the path exactly
    Exact,
}

impl PathMatchType {
    /// Gateway API `HTTPPathMatch.type` value
    pub fn gateway_api_value(&self) -> &'static str {
        match self {
            Self::Prefix => "PathPrefix",
            Self::Exact => "Exact",
        }
    }
}

/// Backend Service the application is served from
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendService {
    /// Service name in the AppOnboarding's namespace
    pub name: String,
    /// Service port to route to
    pub port: i32,
}

/// Path routing configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingSpec {
    /// Path rules, in order
    #[serde(default)]
    pub routes: Vec<RouteRule>,

    /// Listener TLS selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,
}

impl RoutingSpec {
    /// Whether the HTTPS listener is used (defaults to true)
    pub fn tls_enabled(&self) -> bool {
        self.tls.as_ref().map(|t| t.enabled).unwrap_or(true)
    }
}

/// A single path rule
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Path to match
    pub path_prefix: String,

    /// Match type
    #[serde(default)]
    pub path_type: PathMatchType,
}

/// TLS listener selection
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Serve over HTTPS; false attaches the route to the plain HTTP listener
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TlsSpec {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "keycloak".to_string()
}

/// OIDC authentication requirements
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    /// Enforce OIDC in front of the application
    #[serde(default)]
    pub enabled: bool,

    /// Identity provider identifier (`keycloak`, `generic-oidc`)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Requested scopes; a minimal default set is used when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// Register the OIDC client in the provider automatically
    #[serde(default)]
    pub provision_client: bool,

    /// Issuer URL for externally managed providers
    #[serde(
        default,
        rename = "issuerURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub issuer_url: Option<String>,

    /// Secret holding the client secret; defaults to `<name>-oidc-client`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_ref: Option<SecretReference>,

    /// Override of the OAuth2 callback URL
    #[serde(
        default,
        rename = "redirectURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_url: Option<String>,
}

impl Default for AuthSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            scopes: Vec::new(),
            provision_client: false,
            issuer_url: None,
            client_secret_ref: None,
            redirect_url: None,
        }
    }
}

/// Reference to a Secret, namespace defaulting to the referrer's
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret name
    pub name: String,
    /// Secret namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Fully-qualified reference recorded in status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
}

impl ObjectRef {
    /// Create a reference
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Condition status
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is met
    True,
    /// Condition is not met
    False,
    /// Not yet determined
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (Ready, RoutingReady, AuthReady)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the status changed
    pub last_transition_time: DateTime<Utc>,

    /// Generation the condition was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
            observed_generation: None,
        }
    }
}
