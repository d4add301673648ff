//! Envoy Gateway SecurityPolicy types
//!
//! A SecurityPolicy attached to an HTTPRoute makes Envoy run the OIDC
//! authorization code flow in front of the route's backend. Portico only
//! writes the `oidc` section.

use serde::{Deserialize, Serialize};

use crate::impl_api_defaults;
use crate::kube_utils::{HasApiResource, ObjectMeta};

// =============================================================================
// SecurityPolicy
// =============================================================================

/// Envoy Gateway SecurityPolicy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicy {
    /// API version (gateway.envoyproxy.io/v1alpha1)
    #[serde(default = "SecurityPolicy::default_api_version")]
    pub api_version: String,
    /// Resource kind (SecurityPolicy)
    #[serde(default = "SecurityPolicy::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: SecurityPolicySpec,
}

impl HasApiResource for SecurityPolicy {
    const API_VERSION: &'static str = "gateway.envoyproxy.io/v1alpha1";
    const KIND: &'static str = "SecurityPolicy";
}

impl_api_defaults!(SecurityPolicy);

impl SecurityPolicy {
    /// Create a new SecurityPolicy
    pub fn new(metadata: ObjectMeta, spec: SecurityPolicySpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// SecurityPolicy spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicySpec {
    /// Routes the policy applies to
    pub target_refs: Vec<TargetRef>,
    /// OIDC configuration
    pub oidc: OidcConfig,
}

/// Reference to the object a policy is attached to
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    /// API group of the target
    pub group: String,
    /// Kind of the target
    pub kind: String,
    /// Name of the target, in the policy's namespace
    pub name: String,
}

/// OIDC section of a SecurityPolicy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfig {
    /// Identity provider
    pub provider: OidcProvider,
    /// OAuth2 client identifier
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Secret holding the client secret under the `client-secret` key
    pub client_secret: SecretObjectReference,
    /// OAuth2 callback URL
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    /// Requested scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

/// OIDC provider endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OidcProvider {
    /// Issuer URL used for discovery
    pub issuer: String,
}

/// Reference to a Secret
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretObjectReference {
    /// Secret name
    pub name: String,
    /// Secret namespace, defaults to the policy's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}
