//! Environment checks run before anything is written
//!
//! The namespace must carry the opt-in label set to "true" and the backend
//! Service must exist and expose the declared port.

use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::ResourceExt;

use super::{Context, PhaseError};
use crate::conditions::reasons;
use crate::crd::AppOnboarding;
use crate::events::{actions, OnboardingEvent};
use crate::Error;

/// Check namespace opt-in and the backend Service.
///
/// Publishes a Normal event on success and a Warning event naming the
/// failure otherwise. The Ready condition is derived by the caller.
pub async fn validate(onboarding: &AppOnboarding, ctx: &Context) -> Result<(), PhaseError> {
    let result = check(onboarding, ctx).await;
    match &result {
        Ok(()) => {
            ctx.publish(
                onboarding,
                OnboardingEvent::normal(
                    reasons::VALIDATED,
                    actions::VALIDATE,
                    format!(
                        "namespace is opted in and service {} exposes port {}",
                        onboarding.spec.service.name, onboarding.spec.service.port
                    ),
                ),
            )
            .await;
        }
        Err(failure) => {
            ctx.publish(
                onboarding,
                OnboardingEvent::warning(
                    failure.reason,
                    actions::VALIDATE,
                    failure.error.to_string(),
                ),
            )
            .await;
        }
    }
    result
}

async fn check(onboarding: &AppOnboarding, ctx: &Context) -> Result<(), PhaseError> {
    let namespace = onboarding.namespace().unwrap_or_default();
    let label = &ctx.config.namespace_label;

    let ns = ctx
        .kube
        .get_namespace(&namespace)
        .await
        .map_err(|e| PhaseError::new(reasons::RECONCILING, e))?;
    if !namespace_opted_in(ns.as_ref(), label) {
        return Err(PhaseError::new(
            reasons::NAMESPACE_NOT_OPTED_IN,
            Error::NamespaceNotOptedIn {
                namespace,
                label: label.clone(),
            },
        ));
    }

    let backend = &onboarding.spec.service;
    let svc = ctx
        .kube
        .get_service(&namespace, &backend.name)
        .await
        .map_err(|e| PhaseError::new(reasons::RECONCILING, e))?;
    let service_error = |detail: String| {
        PhaseError::new(
            reasons::SERVICE_NOT_FOUND,
            Error::ServiceNotFound {
                namespace: namespace.clone(),
                name: backend.name.clone(),
                detail,
            },
        )
    };
    let Some(svc) = svc else {
        return Err(service_error("not found".to_string()));
    };
    let ports = service_ports(&svc);
    if !ports.contains(&backend.port) {
        return Err(service_error(format!(
            "port {} not exposed (ports: {:?})",
            backend.port, ports
        )));
    }

    Ok(())
}

/// Whether the namespace carries `label=true`
pub fn namespace_opted_in(namespace: Option<&Namespace>, label: &str) -> bool {
    namespace
        .and_then(|ns| ns.metadata.labels.as_ref())
        .and_then(|labels| labels.get(label))
        .is_some_and(|value| value == "true")
}

fn service_ports(svc: &Service) -> Vec<i32> {
    svc.spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .map(|ports| ports.iter().map(|p| p.port).collect())
        .unwrap_or_default()
}
