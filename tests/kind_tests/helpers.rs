//! Test helpers for integration tests
//!
//! Provides utilities for managing the kind cluster and the fixtures an
//! AppOnboarding depends on.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, Service, ServicePort, ServiceSpec};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Config, CustomResourceExt};
use tokio::sync::OnceCell;
use tokio::time::sleep;

use portico::crd::AppOnboarding;
use portico::{DEFAULT_NAMESPACE_LABEL, FIELD_MANAGER};

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "portico-integration-test";

/// Global lock to ensure cluster is created only once
static CLUSTER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Track if CRD has been installed (async-safe)
static CRD_INSTALLED: OnceCell<Result<(), String>> = OnceCell::const_new();

/// Check if a kind cluster with the given name exists
pub fn kind_cluster_exists(name: &str) -> bool {
    let output = Command::new("kind")
        .args(["get", "clusters"])
        .output()
        .expect("failed to run kind");

    let clusters = String::from_utf8_lossy(&output.stdout);
    clusters.lines().any(|line| line.trim() == name)
}

/// Create a kind cluster for testing
pub fn create_kind_cluster(name: &str) -> Result<(), String> {
    if kind_cluster_exists(name) {
        println!("Kind cluster '{name}' already exists, reusing it");
        return Ok(());
    }

    println!("Creating kind cluster '{name}'...");
    let output = Command::new("kind")
        .args(["create", "cluster", "--name", name, "--wait", "60s"])
        .output()
        .map_err(|e| format!("failed to run kind: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "failed to create kind cluster: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    println!("Kind cluster '{name}' created successfully");
    Ok(())
}

/// Install (or update) the AppOnboarding CRD via server-side apply
pub async fn install_crd(client: &Client) -> Result<(), kube::Error> {
    let crd = AppOnboarding::crd();
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());

    println!("Installing AppOnboarding CRD...");
    crds.patch(
        "apponboardings.portico.dev",
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&crd),
    )
    .await?;

    // Wait for CRD to be established
    sleep(Duration::from_secs(2)).await;

    println!("CRD installed successfully");
    Ok(())
}

/// Create a Kubernetes client connected to the test cluster
pub async fn create_test_client() -> Result<Client, String> {
    let context_name = format!("kind-{TEST_CLUSTER_NAME}");

    let config = Config::from_kubeconfig(&kube::config::KubeConfigOptions {
        context: Some(context_name),
        ..Default::default()
    })
    .await
    .map_err(|e| format!("failed to load kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format!("failed to create client: {e}"))
}

/// Ensure the test cluster is ready (thread-safe, cluster created once)
///
/// Returns a fresh Client for each call.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cluster_result = CLUSTER_INIT.get_or_init(|| create_kind_cluster(TEST_CLUSTER_NAME));
    cluster_result.clone()?;

    let client = create_test_client().await?;

    let crd_result = CRD_INSTALLED
        .get_or_init(|| async {
            let client = create_test_client().await?;
            install_crd(&client)
                .await
                .map_err(|e| format!("failed to install CRD: {e}"))
        })
        .await;
    crd_result.clone()?;

    Ok(client)
}

// =============================================================================
// Fixtures
// =============================================================================

/// Create a namespace, opted in or not, replacing any leftover from a prior run
pub async fn create_namespace(client: &Client, name: &str, opted_in: bool) -> Result<(), String> {
    let api: Api<Namespace> = Api::all(client.clone());
    let labels = opted_in
        .then(|| BTreeMap::from([(DEFAULT_NAMESPACE_LABEL.to_string(), "true".to_string())]));
    let ns = Namespace {
        metadata: kube::api::ObjectMeta {
            name: Some(name.to_string()),
            labels,
            ..Default::default()
        },
        ..Default::default()
    };
    api.patch(
        name,
        &PatchParams::apply("portico-tests").force(),
        &Patch::Apply(&ns),
    )
    .await
    .map_err(|e| format!("failed to create namespace {name}: {e}"))?;
    Ok(())
}

/// Create a ClusterIP Service exposing `port`
pub async fn create_service(
    client: &Client,
    namespace: &str,
    name: &str,
    port: i32,
) -> Result<(), String> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let svc = Service {
        metadata: kube::api::ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port,
                ..Default::default()
            }]),
            selector: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
            ..Default::default()
        }),
        ..Default::default()
    };
    match api.create(&PostParams::default(), &svc).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
        Err(e) => Err(format!("failed to create service {namespace}/{name}: {e}")),
    }
}

/// Delete a namespace, ignoring errors
pub async fn cleanup_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;
}
