//! Error types for the Portico operator

use std::time::Duration;

use thiserror::Error;

/// Main error type for Portico operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for AppOnboarding specs or their environment
    #[error("validation error: {0}")]
    Validation(String),

    /// The namespace has not opted in to onboarding
    #[error("namespace {namespace} is not opted in: label {label} must be \"true\"")]
    NamespaceNotOptedIn {
        /// Namespace of the AppOnboarding
        namespace: String,
        /// Required opt-in label key
        label: String,
    },

    /// The backend Service is missing or does not expose the declared port
    #[error("service {namespace}/{name}: {detail}")]
    ServiceNotFound {
        /// Service namespace
        namespace: String,
        /// Service name
        name: String,
        /// What was wrong with it
        detail: String,
    },

    /// The selected Gateway does not exist (yet)
    #[error("gateway {namespace}/{name} not found")]
    GatewayNotFound {
        /// Gateway namespace
        namespace: String,
        /// Gateway name
        name: String,
    },

    /// Unknown or disabled identity provider identifier
    #[error("invalid identity provider '{0}'")]
    InvalidProvider(String),

    /// Identity provider cannot resolve an issuer URL
    #[error("provider {provider}: issuer URL is required")]
    MissingIssuer {
        /// Provider identifier
        provider: String,
    },

    /// Client secret object absent or lacks the expected key
    #[error("client secret {namespace}/{name}: {detail}")]
    MissingCredential {
        /// Secret namespace
        namespace: String,
        /// Secret name
        name: String,
        /// What was missing
        detail: String,
    },

    /// Identity provider operation failed
    #[error("provider error: {0}")]
    Provider(String),

    /// Remote admin API call failed
    #[error("admin API {operation} failed: {message}")]
    AdminApi {
        /// Admin API operation
        operation: &'static str,
        /// Failure detail
        message: String,
    },

    /// Write conflict on a derived object
    #[error("conflict writing {kind} {name}")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Resource name
        name: String,
    },

    /// Reconcile pass exceeded its deadline
    #[error("reconcile timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operator configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a provider error with the given message
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create an admin API error for the given operation
    pub fn admin_api(operation: &'static str, msg: impl Into<String>) -> Self {
        Self::AdminApi {
            operation,
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error needs a human to fix the spec or environment.
    ///
    /// Configuration errors are requeued on a long interval; everything else
    /// (API failures, missing gateways, admin API outages) on a short one.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::NamespaceNotOptedIn { .. }
                | Error::ServiceNotFound { .. }
                | Error::InvalidProvider(_)
                | Error::MissingIssuer { .. }
                | Error::MissingCredential { .. }
                | Error::Config(_)
        )
    }

    /// Whether this is a benign write conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
