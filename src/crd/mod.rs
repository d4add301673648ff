//! Custom Resource Definitions for Portico
//!
//! This module contains the AppOnboarding CRD and the types it shares with
//! the controller.

mod onboarding;
mod types;

pub use onboarding::{AppOnboarding, AppOnboardingSpec, AppOnboardingStatus};
pub use types::{
    AuthSpec, BackendService, Condition, ConditionStatus, GatewayClass, ObjectRef,
    PathMatchType, RouteRule, RoutingSpec, SecretReference, TlsSpec,
};
