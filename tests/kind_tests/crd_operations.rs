//! Integration tests for CRD operations
//!
//! These tests tell the story of how application teams interact with
//! AppOnboarding resources through the Kubernetes API.

use kube::api::{Api, DeleteParams, PostParams};

use portico::crd::{
    AppOnboarding, AppOnboardingSpec, AuthSpec, BackendService, GatewayClass, PathMatchType,
    RouteRule, RoutingSpec,
};

use super::helpers::{cleanup_namespace, create_namespace, ensure_test_cluster};

fn sample_spec() -> AppOnboardingSpec {
    AppOnboardingSpec {
        hostname: "shop.example.com".to_string(),
        service: BackendService {
            name: "storefront".to_string(),
            port: 8080,
        },
        routing: Some(RoutingSpec {
            routes: vec![
                RouteRule {
                    path_prefix: "/".to_string(),
                    path_type: PathMatchType::Prefix,
                },
                RouteRule {
                    path_prefix: "/healthz".to_string(),
                    path_type: PathMatchType::Exact,
                },
            ],
            tls: None,
        }),
        gateway: GatewayClass::Internal,
        auth: Some(AuthSpec {
            enabled: true,
            provider: "generic-oidc".to_string(),
            issuer_url: Some("https://idp.example.com".to_string()),
            ..Default::default()
        }),
    }
}

/// Story: A team submits an AppOnboarding and reads it back unchanged
///
/// Expected behavior:
/// - The resource is accepted by the generated schema
/// - Nested routing and auth settings survive the round trip through etcd
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_team_submits_onboarding() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "portico-crd-create";
    create_namespace(&client, ns, true)
        .await
        .expect("failed to create namespace");
    let api: Api<AppOnboarding> = Api::namespaced(client.clone(), ns);

    let onboarding = AppOnboarding::new("storefront", sample_spec());
    let created = api
        .create(&PostParams::default(), &onboarding)
        .await
        .expect("failed to create AppOnboarding");
    assert_eq!(created.spec.hostname, "shop.example.com");

    let fetched = api.get("storefront").await.expect("failed to get");
    assert_eq!(fetched.spec, sample_spec());
    assert!(fetched.status.is_none());

    let _ = api.delete("storefront", &DeleteParams::default()).await;
    cleanup_namespace(&client, ns).await;
}

/// Story: A team leaves out optional blocks and gets the documented defaults
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_minimal_onboarding_gets_defaults() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "portico-crd-defaults";
    create_namespace(&client, ns, true)
        .await
        .expect("failed to create namespace");
    let api: Api<AppOnboarding> = Api::namespaced(client.clone(), ns);

    let raw: AppOnboarding = serde_yaml::from_str(
        r#"
apiVersion: portico.dev/v1alpha1
kind: AppOnboarding
metadata:
  name: minimal
spec:
  hostname: a.example.com
  service:
    name: svc
    port: 8080
"#,
    )
    .expect("valid manifest");
    api.create(&PostParams::default(), &raw)
        .await
        .expect("failed to create AppOnboarding");

    let fetched = api.get("minimal").await.expect("failed to get");
    assert_eq!(fetched.spec.gateway, GatewayClass::Public);
    assert!(fetched.spec.routing.is_none());
    assert!(fetched.spec.enabled_auth().is_none());

    let _ = api.delete("minimal", &DeleteParams::default()).await;
    cleanup_namespace(&client, ns).await;
}

/// Story: A typo in the gateway selector is rejected by the API server
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_invalid_gateway_is_rejected() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let ns = "portico-crd-invalid";
    create_namespace(&client, ns, true)
        .await
        .expect("failed to create namespace");
    let api: Api<kube::api::DynamicObject> = Api::namespaced_with(
        client.clone(),
        ns,
        &kube::discovery::ApiResource::erase::<AppOnboarding>(&()),
    );

    let obj: kube::api::DynamicObject = serde_json::from_value(serde_json::json!({
        "apiVersion": "portico.dev/v1alpha1",
        "kind": "AppOnboarding",
        "metadata": {"name": "typo"},
        "spec": {
            "hostname": "a.example.com",
            "service": {"name": "svc", "port": 8080},
            "gateway": "pubic"
        }
    }))
    .expect("valid object");
    let result = api.create(&PostParams::default(), &obj).await;
    assert!(result.is_err(), "schema should reject unknown gateway class");

    cleanup_namespace(&client, ns).await;
}
