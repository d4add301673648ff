//! AppOnboarding Custom Resource Definition
//!
//! An AppOnboarding declares how a Service should be exposed: the hostname,
//! optional path routing and optional OIDC enforcement. Everything in status
//! is re-derived by the controller on every pass.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{AuthSpec, BackendService, Condition, GatewayClass, ObjectRef, RoutingSpec};

/// Specification for an AppOnboarding
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "portico.dev",
    version = "v1alpha1",
    kind = "AppOnboarding",
    plural = "apponboardings",
    shortname = "onb",
    status = "AppOnboardingStatus",
    namespaced,
    printcolumn = r#"{"name":"Hostname","type":"string","jsonPath":".spec.hostname"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppOnboardingSpec {
    /// Public hostname of the application
    pub hostname: String,

    /// Backend Service
    pub service: BackendService,

    /// Path routing; no route is created when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingSpec>,

    /// Gateway the route attaches to
    #[serde(default)]
    pub gateway: GatewayClass,

    /// OIDC authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSpec>,
}

impl AppOnboardingSpec {
    /// Auth settings when authentication is enabled
    pub fn enabled_auth(&self) -> Option<&AuthSpec> {
        self.auth.as_ref().filter(|a| a.enabled)
    }
}

/// Status for an AppOnboarding
///
/// Optional fields serialize as `null` when unset so a merge patch of the
/// whole status removes references the controller has cleared.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppOnboardingStatus {
    /// Status conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Generation last reconciled successfully
    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Hostname mirrored from spec
    #[serde(default)]
    pub hostname: Option<String>,

    /// Gateway the route is attached to
    #[serde(default)]
    pub gateway_ref: Option<ObjectRef>,

    /// Secret referenced by the SecurityPolicy
    #[serde(default)]
    pub client_secret_ref: Option<ObjectRef>,
}

impl AppOnboardingStatus {
    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}
