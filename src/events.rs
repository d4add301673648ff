//! Kubernetes Events on AppOnboarding resources
//!
//! Every phase outcome is mirrored as an Event so `kubectl describe
//! apponboarding` tells the same story as the status conditions. Event
//! reasons reuse [`crate::conditions::reasons`]; actions name the phase.
//!
//! Publishing never fails a reconcile. A rejected Event is logged and dropped.

use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use tracing::warn;

use crate::crd::AppOnboarding;

/// A phase outcome worth surfacing on an AppOnboarding
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnboardingEvent {
    /// Normal for progress, Warning for anything the owner must act on
    pub type_: EventType,
    /// Condition reason the Event mirrors
    pub reason: &'static str,
    /// Phase that produced the Event, from [`actions`]
    pub action: &'static str,
    /// Human-readable detail
    pub note: String,
}

impl OnboardingEvent {
    /// A Normal event
    pub fn normal(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason,
            action,
            note: note.into(),
        }
    }

    /// A Warning event
    pub fn warning(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason,
            action,
            note: note.into(),
        }
    }

    fn to_kube(&self) -> Event {
        Event {
            type_: self.type_,
            reason: self.reason.to_string(),
            note: Some(self.note.clone()),
            action: self.action.to_string(),
            secondary: None,
        }
    }
}

/// Sink for AppOnboarding events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Attach `event` to `onboarding`
    async fn publish(&self, onboarding: &AppOnboarding, event: OnboardingEvent);
}

/// Reporter identity shown as the Event's reporting component and instance
pub fn reporter(controller: &str, instance: Option<String>) -> Reporter {
    Reporter {
        controller: controller.to_string(),
        instance,
    }
}

/// Publishes through `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Publisher reporting as `reporter`
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, onboarding: &AppOnboarding, event: OnboardingEvent) {
        let object = onboarding.object_ref(&());
        if let Err(e) = self.recorder.publish(&event.to_kube(), &object).await {
            warn!(
                onboarding = %onboarding.name_any(),
                reason = event.reason,
                action = event.action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Phase names used as the Event action
pub mod actions {
    /// Checking namespace and Service
    pub const VALIDATE: &str = "Validate";
    /// Writing or removing the HTTPRoute
    pub const ROUTE: &str = "Route";
    /// Provisioning or enforcing authentication
    pub const AUTHENTICATE: &str = "Authenticate";
    /// Tearing down on deletion
    pub const CLEANUP: &str = "Cleanup";
}
