//! Integration tests for the reconcile loop
//!
//! These tests drive `reconcile` directly against a real API server so each
//! pass is deterministic. Gateway API and Envoy Gateway CRDs are not
//! installed, so only flows that stop before writing derived objects are
//! exercised here.

use std::sync::Arc;
use std::time::Duration;

use kube::api::{Api, DeleteParams, PostParams};
use kube::runtime::controller::Action;

use portico::conditions::{reasons, AUTH_READY, READY, ROUTING_READY};
use portico::config::OperatorConfig;
use portico::controller::{reconcile, Context, REQUEUE_CONFIG_ERROR_SECS};
use portico::crd::{AppOnboarding, AppOnboardingSpec, BackendService, ConditionStatus};
use portico::FINALIZER;

use super::helpers::{cleanup_namespace, create_namespace, create_service, ensure_test_cluster};

fn minimal_spec() -> AppOnboardingSpec {
    AppOnboardingSpec {
        hostname: "a.example.com".to_string(),
        service: BackendService {
            name: "svc".to_string(),
            port: 8080,
        },
        routing: None,
        gateway: Default::default(),
        auth: None,
    }
}

async fn controller_context(client: &kube::Client) -> Arc<Context> {
    Arc::new(
        Context::builder(client.clone(), OperatorConfig::default())
            .build()
            .expect("failed to build context"),
    )
}

async fn reconcile_named(
    api: &Api<AppOnboarding>,
    ctx: &Arc<Context>,
    name: &str,
) -> Action {
    let latest = api.get(name).await.expect("failed to get AppOnboarding");
    reconcile(Arc::new(latest), ctx.clone())
        .await
        .expect("reconcile failed")
}

/// Story: A team onboards a Service with nothing but a hostname
///
/// Expected behavior:
/// - The finalizer is attached on the first pass
/// - Ready is True, RoutingReady is False/RoutingNotConfigured
/// - observedGeneration matches metadata.generation
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_minimal_onboarding_becomes_ready() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "portico-lifecycle-ready";
    create_namespace(&client, ns, true)
        .await
        .expect("failed to create namespace");
    create_service(&client, ns, "svc", 8080)
        .await
        .expect("failed to create service");

    let api: Api<AppOnboarding> = Api::namespaced(client.clone(), ns);
    api.create(
        &PostParams::default(),
        &AppOnboarding::new("web", minimal_spec()),
    )
    .await
    .expect("failed to create AppOnboarding");

    let ctx = controller_context(&client).await;
    reconcile_named(&api, &ctx, "web").await;

    let onboarding = api.get("web").await.expect("failed to get");
    assert!(onboarding
        .metadata
        .finalizers
        .unwrap_or_default()
        .contains(&FINALIZER.to_string()));
    let status = onboarding.status.expect("status written");
    assert_eq!(status.condition(READY).unwrap().status, ConditionStatus::True);
    assert_eq!(
        status.condition(ROUTING_READY).unwrap().reason,
        reasons::ROUTING_NOT_CONFIGURED
    );
    assert_eq!(
        status.condition(AUTH_READY).unwrap().reason,
        reasons::AUTH_DISABLED
    );
    assert_eq!(status.observed_generation, onboarding.metadata.generation);

    // A second pass leaves Ready's transition time alone
    let before = status.condition(READY).unwrap().last_transition_time;
    tokio::time::sleep(Duration::from_secs(1)).await;
    reconcile_named(&api, &ctx, "web").await;
    let after = api.get("web").await.unwrap().status.unwrap();
    assert_eq!(after.condition(READY).unwrap().last_transition_time, before);

    // Deletion runs cleanup and releases the finalizer
    api.delete("web", &DeleteParams::default())
        .await
        .expect("failed to delete");
    let action = reconcile_named(&api, &ctx, "web").await;
    assert_eq!(action, Action::await_change());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(api.get_opt("web").await.unwrap().is_none());

    cleanup_namespace(&client, ns).await;
}

/// Story: A team forgets to opt their namespace in
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_unlabelled_namespace_is_reported() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "portico-lifecycle-optout";
    create_namespace(&client, ns, false)
        .await
        .expect("failed to create namespace");
    create_service(&client, ns, "svc", 8080)
        .await
        .expect("failed to create service");

    let api: Api<AppOnboarding> = Api::namespaced(client.clone(), ns);
    api.create(
        &PostParams::default(),
        &AppOnboarding::new("web", minimal_spec()),
    )
    .await
    .expect("failed to create AppOnboarding");

    let ctx = controller_context(&client).await;
    let action = reconcile_named(&api, &ctx, "web").await;
    assert_eq!(
        action,
        Action::requeue(Duration::from_secs(REQUEUE_CONFIG_ERROR_SECS))
    );

    let status = api.get("web").await.unwrap().status.expect("status written");
    let ready = status.condition(READY).unwrap();
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.reason, reasons::NAMESPACE_NOT_OPTED_IN);

    // Let the finalizer go so the namespace can be removed
    api.delete("web", &DeleteParams::default()).await.unwrap();
    reconcile_named(&api, &ctx, "web").await;
    cleanup_namespace(&client, ns).await;
}
