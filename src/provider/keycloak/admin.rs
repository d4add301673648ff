//! Keycloak admin REST API client
//!
//! Covers the handful of admin endpoints needed to manage confidential OIDC
//! clients. Every call takes an access token obtained from [`KeycloakAdmin::login`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

/// Client used for the password grant against the admin realm
const ADMIN_CLI_CLIENT: &str = "admin-cli";

/// Timeout for a single admin API request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Keycloak client representation.
///
/// Fields portico does not manage are kept in `extra` so an update sends
/// back everything Keycloak returned.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    /// Internal UUID, assigned by Keycloak
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// OIDC client identifier
    pub client_id: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the client is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Protocol (openid-connect)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Public (secretless) client
    #[serde(default)]
    pub public_client: bool,
    /// Client secret; only sent on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Allowed redirect URIs
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Allowed CORS origins
    #[serde(default)]
    pub web_origins: Vec<String>,
    /// Authorization code flow
    #[serde(default)]
    pub standard_flow_enabled: bool,
    /// Resource owner password grant
    #[serde(default)]
    pub direct_access_grants_enabled: bool,
    /// Client credentials grant
    #[serde(default)]
    pub service_accounts_enabled: bool,
    /// Implicit flow
    #[serde(default)]
    pub implicit_flow_enabled: bool,
    /// Everything else Keycloak returned
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CredentialRepresentation {
    #[serde(default)]
    value: Option<String>,
}

/// Keycloak admin API operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeycloakAdmin: Send + Sync {
    /// Obtain an access token for an admin user in `realm`
    async fn login(&self, realm: &str, username: &str, password: &str) -> Result<String>;

    /// List clients whose clientId matches `client_id`
    async fn list_clients(
        &self,
        token: &str,
        realm: &str,
        client_id: &str,
    ) -> Result<Vec<ClientRepresentation>>;

    /// Read a client's secret
    async fn get_client_secret(&self, token: &str, realm: &str, client_uuid: &str)
        -> Result<String>;

    /// Create a client
    async fn create_client(
        &self,
        token: &str,
        realm: &str,
        client: &ClientRepresentation,
    ) -> Result<()>;

    /// Update a client identified by `client.id`
    async fn update_client(
        &self,
        token: &str,
        realm: &str,
        client: &ClientRepresentation,
    ) -> Result<()>;

    /// Delete a client; already gone is success
    async fn delete_client(&self, token: &str, realm: &str, client_uuid: &str) -> Result<()>;
}

/// reqwest-backed admin API client
pub struct HttpKeycloakAdmin {
    http: reqwest::Client,
    base_url: String,
}

impl HttpKeycloakAdmin {
    /// Create a client for the Keycloak at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn token_url(&self, realm: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, realm
        )
    }

    fn clients_url(&self, realm: &str) -> String {
        format!("{}/admin/realms/{}/clients", self.base_url, realm)
    }

    fn client_url(&self, realm: &str, client_uuid: &str) -> String {
        format!("{}/{}", self.clients_url(realm), client_uuid)
    }
}

/// Turn a non-2xx response into an admin API error carrying the body
async fn check(operation: &'static str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::admin_api(operation, format!("HTTP {status}: {body}")))
}

fn transport(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Error {
    move |e| Error::admin_api(operation, e.to_string())
}

#[async_trait]
impl KeycloakAdmin for HttpKeycloakAdmin {
    async fn login(&self, realm: &str, username: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.token_url(realm))
            .form(&[
                ("grant_type", "password"),
                ("client_id", ADMIN_CLI_CLIENT),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .map_err(transport("login"))?;
        let token: TokenResponse = check("login", response)
            .await?
            .json()
            .await
            .map_err(transport("login"))?;
        Ok(token.access_token)
    }

    async fn list_clients(
        &self,
        token: &str,
        realm: &str,
        client_id: &str,
    ) -> Result<Vec<ClientRepresentation>> {
        let response = self
            .http
            .get(self.clients_url(realm))
            .bearer_auth(token)
            .query(&[("clientId", client_id)])
            .send()
            .await
            .map_err(transport("list clients"))?;
        check("list clients", response)
            .await?
            .json()
            .await
            .map_err(transport("list clients"))
    }

    async fn get_client_secret(
        &self,
        token: &str,
        realm: &str,
        client_uuid: &str,
    ) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/client-secret", self.client_url(realm, client_uuid)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport("get client secret"))?;
        let credential: CredentialRepresentation = check("get client secret", response)
            .await?
            .json()
            .await
            .map_err(transport("get client secret"))?;
        credential
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::admin_api("get client secret", "client has no secret"))
    }

    async fn create_client(
        &self,
        token: &str,
        realm: &str,
        client: &ClientRepresentation,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.clients_url(realm))
            .bearer_auth(token)
            .json(client)
            .send()
            .await
            .map_err(transport("create client"))?;
        check("create client", response).await?;
        debug!(client_id = %client.client_id, realm, "created keycloak client");
        Ok(())
    }

    async fn update_client(
        &self,
        token: &str,
        realm: &str,
        client: &ClientRepresentation,
    ) -> Result<()> {
        let uuid = client
            .id
            .as_deref()
            .ok_or_else(|| Error::admin_api("update client", "client has no id"))?;
        let response = self
            .http
            .put(self.client_url(realm, uuid))
            .bearer_auth(token)
            .json(client)
            .send()
            .await
            .map_err(transport("update client"))?;
        check("update client", response).await?;
        Ok(())
    }

    async fn delete_client(&self, token: &str, realm: &str, client_uuid: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.client_url(realm, client_uuid))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport("delete client"))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(client_uuid, realm, "keycloak client already deleted");
            return Ok(());
        }
        check("delete client", response).await?;
        Ok(())
    }
}
