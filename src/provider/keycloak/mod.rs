//! Keycloak identity provider
//!
//! Registers one confidential OIDC client per AppOnboarding in the configured
//! realm. An existing client keeps its secret across updates so sessions
//! established with it stay valid; only redirect URIs, origins and flow
//! toggles are rewritten.

pub mod admin;

pub use admin::{ClientRepresentation, HttpKeycloakAdmin, KeycloakAdmin};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{ClientRequest, IdentityProvider, ProviderKind, ProvisionedClient};
use crate::config::KeycloakConfig;
use crate::crd::AuthSpec;
use crate::kube_client::KubeClient;
use crate::naming::{self, CLIENT_SECRET_KEY};
use crate::{Error, Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_PORTICO};

/// Realm the admin user authenticates against
pub const ADMIN_REALM: &str = "master";

/// Length of generated client secrets
pub const CLIENT_SECRET_LEN: usize = 32;

/// Accepted (username, password) key pairs in the admin credentials secret
const CREDENTIAL_KEYS: [(&str, &str); 2] = [
    ("username", "password"),
    ("KEYCLOAK_ADMIN", "KEYCLOAK_ADMIN_PASSWORD"),
];

/// Keycloak admin login
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    /// Admin username
    pub username: String,
    /// Admin password
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl AdminCredentials {
    /// Read credentials from a secret using either supported key convention
    pub fn from_secret(secret: &Secret) -> Option<Self> {
        let data = secret.data.as_ref()?;
        let read = |key: &str| {
            data.get(key)
                .and_then(|v| String::from_utf8(v.0.clone()).ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        CREDENTIAL_KEYS.iter().find_map(|(user_key, pass_key)| {
            Some(Self {
                username: read(user_key)?,
                password: read(pass_key)?,
            })
        })
    }
}

/// Generate a new client secret: 32 random bytes, URL-safe base64, 32 chars
pub fn generate_client_secret() -> Result<String> {
    let mut raw = [0u8; 32];
    aws_lc_rs::rand::fill(&mut raw).map_err(|_| Error::internal("random generation failed"))?;
    let mut secret = URL_SAFE_NO_PAD.encode(raw);
    secret.truncate(CLIENT_SECRET_LEN);
    Ok(secret)
}

/// Keycloak-backed identity provider
pub struct KeycloakProvider {
    admin: Arc<dyn KeycloakAdmin>,
    kube: Arc<dyn KubeClient>,
    config: KeycloakConfig,
    /// Cached admin login, dropped after a failed login so a rotated
    /// password is picked up on the next attempt
    credentials: Mutex<Option<AdminCredentials>>,
}

impl KeycloakProvider {
    /// Create a provider using the given admin API client
    pub fn new(
        admin: Arc<dyn KeycloakAdmin>,
        kube: Arc<dyn KubeClient>,
        config: KeycloakConfig,
    ) -> Self {
        Self {
            admin,
            kube,
            config,
            credentials: Mutex::new(None),
        }
    }

    async fn credentials(&self) -> Result<AdminCredentials> {
        let mut cached = self.credentials.lock().await;
        if let Some(creds) = cached.as_ref() {
            return Ok(creds.clone());
        }
        let creds = self.load_credentials().await?;
        *cached = Some(creds.clone());
        Ok(creds)
    }

    /// Credentials from the admin secret, falling back to configured values
    async fn load_credentials(&self) -> Result<AdminCredentials> {
        let secret_ref = &self.config.admin_secret;
        let secret = self
            .kube
            .get_secret(&secret_ref.namespace, &secret_ref.name)
            .await?;
        if let Some(creds) = secret.as_ref().and_then(AdminCredentials::from_secret) {
            debug!(secret = %secret_ref.name, "loaded keycloak admin credentials from secret");
            return Ok(creds);
        }

        match (&self.config.fallback_username, &self.config.fallback_password) {
            (Some(username), Some(password)) => Ok(AdminCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(Error::config(format!(
                "keycloak admin credentials not found in secret {}/{} and KEYCLOAK_ADMIN_USER/KEYCLOAK_ADMIN_PASSWORD are unset",
                secret_ref.namespace, secret_ref.name
            ))),
        }
    }

    async fn login(&self) -> Result<String> {
        let creds = self.credentials().await?;
        match self
            .admin
            .login(ADMIN_REALM, &creds.username, &creds.password)
            .await
        {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(error = %e, "keycloak admin login failed, reloading credentials on next attempt");
                self.credentials.lock().await.take();
                Err(e)
            }
        }
    }

    async fn find_client(&self, token: &str, client_id: &str) -> Result<Option<ClientRepresentation>> {
        let clients = self
            .admin
            .list_clients(token, &self.config.realm, client_id)
            .await?;
        Ok(clients.into_iter().find(|c| c.client_id == client_id))
    }

    /// Write the client secret into the AppOnboarding's namespace
    async fn store_secret(&self, request: &ClientRequest, client_secret: &str) -> Result<()> {
        let mut labels = BTreeMap::new();
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_PORTICO.to_string(),
        );
        let mut data = BTreeMap::new();
        data.insert(
            CLIENT_SECRET_KEY.to_string(),
            ByteString(client_secret.as_bytes().to_vec()),
        );

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(request.secret_name.clone()),
                namespace: Some(request.namespace.clone()),
                labels: Some(labels),
                owner_references: Some(vec![request.owner.clone()]),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        };
        self.kube.apply_secret(&secret).await
    }
}

/// Apply the fields portico manages to a client representation
fn apply_managed_fields(client: &mut ClientRepresentation, request: &ClientRequest) {
    client.name = Some(request.display_name.clone());
    client.enabled = true;
    client.protocol = Some("openid-connect".to_string());
    client.public_client = false;
    client.redirect_uris = request.redirect_uris.clone();
    client.web_origins = request.web_origins.clone();
    client.standard_flow_enabled = true;
    client.direct_access_grants_enabled = false;
    client.service_accounts_enabled = false;
    client.implicit_flow_enabled = false;
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Keycloak
    }

    fn issuer_url(&self, _auth: &AuthSpec) -> Result<String> {
        Ok(self.config.issuer_url())
    }

    fn client_id(&self, namespace: &str, name: &str) -> String {
        naming::client_id(namespace, name)
    }

    fn supports_provisioning(&self) -> bool {
        true
    }

    #[instrument(skip(self, request), fields(client_id = %request.client_id, realm = %self.config.realm))]
    async fn provision_client(&self, request: &ClientRequest) -> Result<ProvisionedClient> {
        let token = self.login().await?;
        let realm = &self.config.realm;

        let (secret, created) = match self.find_client(&token, &request.client_id).await? {
            Some(mut client) => {
                let uuid = client.id.clone().ok_or_else(|| {
                    Error::admin_api("list clients", "client returned without an id")
                })?;
                let secret = self.admin.get_client_secret(&token, realm, &uuid).await?;
                apply_managed_fields(&mut client, request);
                client.secret = None;
                self.admin.update_client(&token, realm, &client).await?;
                debug!("updated existing keycloak client");
                (secret, false)
            }
            None => {
                let secret = generate_client_secret()?;
                let mut client = ClientRepresentation {
                    client_id: request.client_id.clone(),
                    secret: Some(secret.clone()),
                    ..Default::default()
                };
                apply_managed_fields(&mut client, request);
                self.admin.create_client(&token, realm, &client).await?;
                info!("created keycloak client");
                (secret, true)
            }
        };

        self.store_secret(request, &secret).await?;

        Ok(ProvisionedClient {
            client_id: request.client_id.clone(),
            secret,
            created,
        })
    }

    #[instrument(skip(self), fields(realm = %self.config.realm))]
    async fn deprovision_client(&self, client_id: &str) -> Result<()> {
        let token = self.login().await?;
        let Some(client) = self.find_client(&token, client_id).await? else {
            debug!("keycloak client already absent");
            return Ok(());
        };
        let Some(uuid) = client.id else {
            return Err(Error::admin_api(
                "list clients",
                "client returned without an id",
            ));
        };
        self.admin
            .delete_client(&token, &self.config.realm, &uuid)
            .await?;
        info!("deleted keycloak client");
        Ok(())
    }
}
