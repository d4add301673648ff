//! AppOnboarding controller
//!
//! Each pass re-derives everything from the spec and the cluster: validation,
//! then routing, then auth, stopping at the first phase that fails. Status is
//! written once at the end of the pass. Deletion runs cleanup and only then
//! releases the finalizer.

mod auth;
mod routing;
mod validation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use auth::{compile_security_policy, credential_ref, reconcile_auth, DEFAULT_SCOPES};
pub use routing::{compile_route, reconcile_routing};
pub use validation::{namespace_opted_in, validate};

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::conditions::{reasons, set_condition, AUTH_READY, READY, ROUTING_READY};
use crate::config::OperatorConfig;
use crate::crd::{AppOnboarding, AppOnboardingStatus, ConditionStatus};
use crate::events::{actions, reporter, EventPublisher, KubeEventPublisher, OnboardingEvent};
use crate::gateway::HttpRoute;
use crate::kube_client::{KubeClient, KubeClientImpl};
use crate::kube_utils::HasApiResource;
use crate::naming;
use crate::provider::ProviderRegistry;
use crate::{Error, FINALIZER};

/// Controller name used as the event reporter
pub const CONTROLLER_NAME: &str = "portico-controller";

/// Periodic re-verification after a successful pass
pub const REQUEUE_SUCCESS_SECS: u64 = 600;
/// Retry delay for errors that need a human to fix the spec or environment
pub const REQUEUE_CONFIG_ERROR_SECS: u64 = 300;
/// Retry delay for transient and dependency-not-ready errors
pub const REQUEUE_TRANSIENT_SECS: u64 = 30;

// =============================================================================
// Context
// =============================================================================

/// Controller context shared across reconciles
///
/// Use [`ContextBuilder`] to construct instances:
///
/// ```ignore
/// let ctx = Context::builder(client, config).build()?;
/// ```
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Enabled identity providers
    pub providers: Arc<ProviderRegistry>,
    /// Event publisher
    pub events: Arc<dyn EventPublisher>,
    /// Operator configuration
    pub config: Arc<OperatorConfig>,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client, config: OperatorConfig) -> ContextBuilder {
        ContextBuilder::new(client, config)
    }

    /// Publish an event on an AppOnboarding
    pub async fn publish(&self, onboarding: &AppOnboarding, event: OnboardingEvent) {
        self.events.publish(onboarding, event).await;
    }

    /// Create a context for testing with a mock Kubernetes client
    ///
    /// Uses the default configuration, the generic OIDC provider and an
    /// in-memory event log.
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        use crate::provider::GenericOidcProvider;

        Self {
            kube,
            providers: Arc::new(
                ProviderRegistry::new().register(Arc::new(GenericOidcProvider::new())),
            ),
            events: Arc::new(fixtures::RecordedEvents::default()),
            config: Arc::new(OperatorConfig::default()),
        }
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    config: OperatorConfig,
    kube: Option<Arc<dyn KubeClient>>,
    providers: Option<Arc<ProviderRegistry>>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl ContextBuilder {
    fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            client,
            config,
            kube: None,
            providers: None,
            events: None,
        }
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Override the provider registry
    pub fn providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Override the event publisher
    pub fn events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the Context, constructing the provider registry from config
    /// unless one was supplied
    pub fn build(self) -> Result<Context, Error> {
        let kube = self
            .kube
            .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client.clone())));
        let providers = match self.providers {
            Some(providers) => providers,
            None => Arc::new(ProviderRegistry::from_config(&self.config, kube.clone())?),
        };
        let events = self.events.unwrap_or_else(|| {
            Arc::new(KubeEventPublisher::new(
                self.client.clone(),
                reporter(CONTROLLER_NAME, self.config.instance.clone()),
            ))
        });

        Ok(Context {
            kube,
            providers,
            events,
            config: Arc::new(self.config),
        })
    }
}

// =============================================================================
// Phase outcome
// =============================================================================

/// A failed phase: the condition reason to record and the underlying error
#[derive(Debug)]
pub struct PhaseError {
    /// Condition and event reason
    pub reason: &'static str,
    /// What went wrong
    pub error: Error,
}

impl PhaseError {
    /// Pair a reason with an error
    pub fn new(reason: &'static str, error: Error) -> Self {
        Self { reason, error }
    }

    /// Requeue delay for this failure
    pub fn requeue(&self) -> Action {
        requeue_for(&self.error)
    }
}

fn requeue_for(error: &Error) -> Action {
    if error.is_config_error() {
        Action::requeue(Duration::from_secs(REQUEUE_CONFIG_ERROR_SECS))
    } else {
        Action::requeue(Duration::from_secs(REQUEUE_TRANSIENT_SECS))
    }
}

// =============================================================================
// Reconcile
// =============================================================================

/// Reconcile under the configured deadline.
///
/// Dropping the pass on timeout cancels any in-flight API or admin calls.
pub async fn reconcile_with_timeout(
    onboarding: Arc<AppOnboarding>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let deadline = ctx.config.reconcile_timeout;
    tokio::time::timeout(deadline, reconcile(onboarding, ctx))
        .await
        .map_err(|_| Error::Timeout(deadline))?
}

/// Reconcile an AppOnboarding
///
/// Fetches the latest copy of the object, handles deletion, ensures the
/// finalizer, then runs validation, routing and auth in order. Phase
/// failures are recorded in status and requeued; only failures to talk to
/// the API server outside a phase are returned as errors.
#[instrument(
    skip(onboarding, ctx),
    fields(onboarding = %onboarding.name_any(), namespace = %onboarding.namespace().unwrap_or_default())
)]
pub async fn reconcile(onboarding: Arc<AppOnboarding>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = onboarding.name_any();
    let namespace = onboarding.namespace().unwrap_or_default();

    let Some(onboarding) = ctx.kube.get_onboarding(&namespace, &name).await? else {
        debug!("AppOnboarding no longer exists");
        return Ok(Action::await_change());
    };

    if onboarding.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&onboarding, &ctx).await;
    }

    if !has_finalizer(&onboarding) {
        info!("adding finalizer");
        ctx.kube.add_finalizer(&namespace, &name, FINALIZER).await?;
    }

    let generation = onboarding.metadata.generation;
    let mut status = onboarding
        .status
        .clone()
        .unwrap_or_else(|| initial_status(generation));
    status.hostname = Some(onboarding.spec.hostname.clone());

    let outcome = run_phases(&onboarding, &ctx, &mut status).await;
    let action = match &outcome {
        Ok(()) => {
            status.observed_generation = generation;
            set_condition(
                &mut status.conditions,
                READY,
                ConditionStatus::True,
                reasons::RECONCILED,
                "all phases succeeded",
                generation,
            );
            info!("reconciled");
            Action::requeue(Duration::from_secs(REQUEUE_SUCCESS_SECS))
        }
        Err(failure) => {
            set_condition(
                &mut status.conditions,
                READY,
                ConditionStatus::False,
                failure.reason,
                failure.error.to_string(),
                generation,
            );
            warn!(reason = failure.reason, error = %failure.error, "reconcile phase failed");
            failure.requeue()
        }
    };

    ctx.kube.patch_status(&namespace, &name, &status).await?;
    Ok(action)
}

async fn run_phases(
    onboarding: &AppOnboarding,
    ctx: &Context,
    status: &mut AppOnboardingStatus,
) -> Result<(), PhaseError> {
    validate(onboarding, ctx).await?;
    reconcile_routing(onboarding, ctx, status).await?;
    reconcile_auth(onboarding, ctx, status).await
}

/// Status for an AppOnboarding seen for the first time
pub fn initial_status(generation: Option<i64>) -> AppOnboardingStatus {
    let mut status = AppOnboardingStatus::default();
    for type_ in [READY, ROUTING_READY, AUTH_READY] {
        set_condition(
            &mut status.conditions,
            type_,
            ConditionStatus::Unknown,
            reasons::RECONCILING,
            "reconciliation has not completed",
            generation,
        );
    }
    status
}

/// Whether the cleanup finalizer is present
pub fn has_finalizer(onboarding: &AppOnboarding) -> bool {
    onboarding.finalizers().iter().any(|f| f == FINALIZER)
}

// =============================================================================
// Deletion
// =============================================================================

async fn handle_deletion(onboarding: &AppOnboarding, ctx: &Context) -> Result<Action, Error> {
    if !has_finalizer(onboarding) {
        return Ok(Action::await_change());
    }

    let name = onboarding.name_any();
    let namespace = onboarding.namespace().unwrap_or_default();

    if let Err(e) = cleanup(onboarding, ctx).await {
        ctx.publish(
            onboarding,
            OnboardingEvent::warning(
                "CleanupFailed",
                actions::CLEANUP,
                e.to_string(),
            ),
        )
        .await;
        return Err(e);
    }

    ctx.kube
        .remove_finalizer(&namespace, &name, FINALIZER)
        .await?;
    info!("cleanup complete, finalizer removed");
    Ok(Action::await_change())
}

/// Tear down what owner references cannot: the route (synchronously) and
/// any externally provisioned OIDC client.
///
/// Any error leaves the finalizer in place so deletion is retried.
#[instrument(skip(onboarding, ctx), fields(onboarding = %onboarding.name_any()))]
pub async fn cleanup(onboarding: &AppOnboarding, ctx: &Context) -> Result<(), Error> {
    let name = onboarding.name_any();
    let namespace = onboarding.namespace().unwrap_or_default();

    ctx.kube
        .delete_object(
            &HttpRoute::api_resource(),
            &namespace,
            &naming::route_name(&name),
        )
        .await?;
    debug!("HTTPRoute deleted");

    let Some(auth) = onboarding.spec.enabled_auth() else {
        return Ok(());
    };
    if !auth.provision_client {
        return Ok(());
    }

    let provider = match ctx.providers.resolve(&auth.provider) {
        Ok(provider) => provider,
        Err(e) => {
            warn!(provider = %auth.provider, error = %e, "provider not resolvable, skipping client deprovisioning");
            return Ok(());
        }
    };
    if !provider.supports_provisioning() {
        return Ok(());
    }

    let client_id = provider.client_id(&namespace, &name);
    provider.deprovision_client(&client_id).await?;
    info!(client_id = %client_id, "OIDC client deprovisioned");
    Ok(())
}

/// Requeue policy for errors returned from [`reconcile`]
pub fn error_policy(onboarding: Arc<AppOnboarding>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        onboarding = %onboarding.name_any(),
        "reconciliation failed"
    );
    requeue_for(error)
}
