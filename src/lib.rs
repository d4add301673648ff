//! Portico - onboard applications behind a shared gateway
//!
//! Portico watches `AppOnboarding` resources and keeps the derived objects
//! needed to expose a backend Service in sync: a Gateway API `HTTPRoute`, an
//! Envoy Gateway `SecurityPolicy` enforcing OIDC, and (for managed identity
//! providers) a client registered in the provider's admin API.
//!
//! # Modules
//!
//! - [`crd`] - The `AppOnboarding` custom resource and shared status types
//! - [`controller`] - Reconcile loop, phases and deletion cleanup
//! - [`conditions`] - Status condition bookkeeping
//! - [`naming`] - Deterministic names for derived objects and external clients
//! - [`gateway`] - Gateway API `HTTPRoute` types
//! - [`policy`] - Envoy Gateway `SecurityPolicy` types
//! - [`provider`] - Identity provider strategies (Keycloak, generic OIDC)
//! - [`kube_client`] - Mockable Kubernetes API access
//! - [`kube_utils`] - Shared metadata and dynamic API helpers
//! - [`events`] - Kubernetes Event publishing
//! - [`config`] - Operator configuration
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod conditions;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod events;
pub mod gateway;
pub mod kube_client;
pub mod kube_utils;
pub mod naming;
pub mod policy;
pub mod provider;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Well-known keys
// =============================================================================

/// Finalizer guarding external client deprovisioning and route teardown
pub const FINALIZER: &str = "portico.dev/cleanup";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "portico-controller";

/// Default namespace label that opts a namespace into onboarding
pub const DEFAULT_NAMESPACE_LABEL: &str = "portico.dev/enabled";

/// Label identifying the AppOnboarding that owns a derived object
pub const LABEL_ONBOARDING: &str = "portico.dev/onboarding";

/// Standard Kubernetes managed-by label key
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label on everything portico creates
pub const LABEL_MANAGED_BY_PORTICO: &str = "portico";

/// Annotation set on routes served over the plain-HTTP listener
pub const ANNOTATION_TLS_ENABLED: &str = "portico.dev/tls-enabled";
