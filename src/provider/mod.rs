//! Identity provider abstraction
//!
//! An AppOnboarding names its identity provider by identifier. Each provider
//! implements [`IdentityProvider`] to resolve the issuer URL and client ID the
//! SecurityPolicy needs and, when it manages clients itself, to provision and
//! deprovision the OIDC client.
//!
//! # Supported Providers
//!
//! - [`KeycloakProvider`] - Keycloak, clients registered through the admin API
//! - [`GenericOidcProvider`] - Any external OIDC issuer, clients registered by hand
//!
//! The set of enabled providers is fixed at startup in a [`ProviderRegistry`].

mod generic;
pub mod keycloak;

pub use generic::GenericOidcProvider;
pub use keycloak::KeycloakProvider;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

#[cfg(test)]
use mockall::automock;

use crate::config::OperatorConfig;
use crate::crd::AuthSpec;
use crate::kube_client::KubeClient;
use keycloak::admin::HttpKeycloakAdmin;
use crate::{Error, Result};

/// Supported identity provider identifiers
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum,
)]
pub enum ProviderKind {
    /// Keycloak with managed client registration
    Keycloak,
    /// Externally managed OIDC provider
    GenericOidc,
}

impl ProviderKind {
    /// Identifier used in AppOnboarding specs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keycloak => "keycloak",
            Self::GenericOidc => "generic-oidc",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keycloak" => Ok(Self::Keycloak),
            "generic-oidc" => Ok(Self::GenericOidc),
            _ => Err(Error::InvalidProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a provider needs to register a client for an AppOnboarding
#[derive(Clone, Debug, PartialEq)]
pub struct ClientRequest {
    /// OIDC client identifier
    pub client_id: String,
    /// Namespace of the AppOnboarding
    pub namespace: String,
    /// Human-readable client name
    pub display_name: String,
    /// Allowed redirect URIs
    pub redirect_uris: Vec<String>,
    /// Allowed browser origins
    pub web_origins: Vec<String>,
    /// Secret the client secret is written to
    pub secret_name: String,
    /// Owner of the written Secret
    pub owner: OwnerReference,
}

/// Result of provisioning a client
#[derive(Clone, PartialEq)]
pub struct ProvisionedClient {
    /// OIDC client identifier
    pub client_id: String,
    /// Shared client secret
    pub secret: String,
    /// True if the client was newly created
    pub created: bool,
}

impl std::fmt::Debug for ProvisionedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedClient")
            .field("client_id", &self.client_id)
            .field("secret", &"[REDACTED]")
            .field("created", &self.created)
            .finish()
    }
}

/// Trait implemented by every identity provider
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Which provider this is
    fn kind(&self) -> ProviderKind;

    /// Issuer URL the gateway discovers OIDC endpoints from
    fn issuer_url(&self, auth: &AuthSpec) -> Result<String>;

    /// Client identifier for an AppOnboarding
    fn client_id(&self, namespace: &str, name: &str) -> String;

    /// Whether [`IdentityProvider::provision_client`] is implemented
    fn supports_provisioning(&self) -> bool;

    /// Create or update the client and persist its secret
    async fn provision_client(&self, request: &ClientRequest) -> Result<ProvisionedClient>;

    /// Delete the client; a missing client is success
    async fn deprovision_client(&self, client_id: &str) -> Result<()>;
}

/// Identity providers enabled for this operator instance
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderKind, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one of the same kind
    pub fn register(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Resolve a provider identifier from an AppOnboarding spec
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn IdentityProvider>> {
        let kind: ProviderKind = identifier.parse()?;
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::InvalidProvider(identifier.to_string()))
    }

    /// Build the registry for the providers enabled in `config`
    pub fn from_config(config: &OperatorConfig, kube: Arc<dyn KubeClient>) -> Result<Self> {
        let mut registry = Self::new();
        for kind in &config.providers {
            let provider: Arc<dyn IdentityProvider> = match kind {
                ProviderKind::GenericOidc => Arc::new(GenericOidcProvider::new()),
                ProviderKind::Keycloak => {
                    let keycloak = config.keycloak.clone().ok_or_else(|| {
                        Error::config("keycloak provider enabled without keycloak settings")
                    })?;
                    let admin = Arc::new(HttpKeycloakAdmin::new(keycloak.url.clone())?);
                    Arc::new(KeycloakProvider::new(admin, kube.clone(), keycloak))
                }
            };
            registry = registry.register(provider);
        }
        Ok(registry)
    }
}
