//! Externally managed OIDC provider
//!
//! The client is registered by hand in whatever identity provider the team
//! uses; portico only needs the issuer URL and a reference to the Secret
//! holding the client secret.

use async_trait::async_trait;

use super::{ClientRequest, IdentityProvider, ProviderKind, ProvisionedClient};
use crate::crd::AuthSpec;
use crate::{naming, Error, Result};

/// Provider for issuers portico does not administer
#[derive(Clone, Debug, Default)]
pub struct GenericOidcProvider;

impl GenericOidcProvider {
    /// Create a new generic OIDC provider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityProvider for GenericOidcProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GenericOidc
    }

    fn issuer_url(&self, auth: &AuthSpec) -> Result<String> {
        auth.issuer_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::MissingIssuer {
                provider: self.kind().to_string(),
            })
    }

    fn client_id(&self, namespace: &str, name: &str) -> String {
        naming::client_id(namespace, name)
    }

    fn supports_provisioning(&self) -> bool {
        false
    }

    async fn provision_client(&self, request: &ClientRequest) -> Result<ProvisionedClient> {
        Err(Error::provider(format!(
            "{} cannot provision clients; register client '{}' with your identity provider \
             and store its secret in {}/{}",
            self.kind(),
            request.client_id,
            request.namespace,
            request.secret_name
        )))
    }

    async fn deprovision_client(&self, _client_id: &str) -> Result<()> {
        Ok(())
    }
}
