//! Test fixtures: a MockKubeClient backed by an in-memory object store

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use k8s_openapi::api::core::v1::{Namespace, Secret, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::ByteString;
use async_trait::async_trait;
use kube::api::{DynamicObject, ObjectMeta};
use kube::ResourceExt;

use crate::crd::{AppOnboarding, AppOnboardingSpec, AppOnboardingStatus, BackendService};
use crate::events::{EventPublisher, OnboardingEvent};
use crate::kube_client::MockKubeClient;
use crate::naming::CLIENT_SECRET_KEY;
use crate::{DEFAULT_NAMESPACE_LABEL, FINALIZER};

pub const NAMESPACE: &str = "shop";
pub const NAME: &str = "web";

/// Key of a stored dynamic object: (kind, namespace, name)
pub type ObjectKey = (String, String, String);

pub fn basic_spec() -> AppOnboardingSpec {
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

pub fn onboarding(spec: AppOnboardingSpec) -> AppOnboarding {
    let mut ob = AppOnboarding::new(NAME, spec);
    ob.metadata.namespace = Some(NAMESPACE.to_string());
    ob.metadata.uid = Some("uid-1".to_string());
    ob.metadata.generation = Some(3);
    ob.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
    ob
}

pub fn deleting(mut ob: AppOnboarding) -> AppOnboarding {
    ob.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    ob
}

pub fn namespace(opt_in: Option<&str>) -> Namespace {
    let labels = opt_in.map(|value| {
        BTreeMap::from([(DEFAULT_NAMESPACE_LABEL.to_string(), value.to_string())])
    });
    Namespace {
        metadata: ObjectMeta {
            name: Some(NAMESPACE.to_string()),
            labels,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn service(ports: &[i32]) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some("svc".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(
                ports
                    .iter()
                    .map(|port| ServicePort {
                        port: *port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn credential(name: &str, key: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            key.to_string(),
            ByteString(b"s3cret".to_vec()),
        )])),
        ..Default::default()
    }
}

pub fn client_credential(name: &str) -> Secret {
    credential(name, CLIENT_SECRET_KEY)
}

fn gateway_object(namespace: &str, name: &str) -> DynamicObject {
    DynamicObject {
        types: None,
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: serde_json::json!({}),
    }
}

/// Cluster state the fake API server starts from
pub struct ClusterState {
    pub onboarding: Option<AppOnboarding>,
    pub namespace: Option<Namespace>,
    pub service: Option<Service>,
    pub gateways: Vec<(String, String)>,
    pub secrets: Vec<Secret>,
}

impl ClusterState {
    /// An opted-in namespace with a matching Service and both default gateways
    pub fn healthy(onboarding: AppOnboarding) -> Self {
        Self {
            onboarding: Some(onboarding),
            namespace: Some(namespace(Some("true"))),
            service: Some(service(&[8080])),
            gateways: vec![
                ("gateway-system".to_string(), "public-gateway".to_string()),
                ("gateway-system".to_string(), "internal-gateway".to_string()),
            ],
            secrets: Vec::new(),
        }
    }
}

/// What the controller wrote
#[derive(Clone, Default)]
pub struct Captured {
    pub statuses: Arc<Mutex<Vec<AppOnboardingStatus>>>,
    pub objects: Arc<Mutex<BTreeMap<ObjectKey, DynamicObject>>>,
    pub writes: Arc<Mutex<Vec<ObjectKey>>>,
    pub deleted: Arc<Mutex<Vec<ObjectKey>>>,
    pub secrets: Arc<Mutex<Vec<Secret>>>,
    pub finalizers_added: Arc<Mutex<u32>>,
    pub finalizers_removed: Arc<Mutex<u32>>,
}

impl Captured {
    pub fn last_status(&self) -> AppOnboardingStatus {
        self.statuses
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no status was written")
    }

    pub fn object(&self, kind: &str, name: &str) -> Option<DynamicObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind.to_string(), NAMESPACE.to_string(), name.to_string()))
            .cloned()
    }

    pub fn was_deleted(&self, kind: &str, name: &str) -> bool {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .any(|(k, _, n)| k == kind && n == name)
    }

    pub fn finalizers_removed(&self) -> u32 {
        *self.finalizers_removed.lock().unwrap()
    }
}

/// Build a MockKubeClient serving `state` and recording every write
pub fn mock_cluster(state: ClusterState) -> (MockKubeClient, Captured) {
    let captured = Captured::default();
    let mut kube = MockKubeClient::new();

    {
        let mut objects = captured.objects.lock().unwrap();
        for (ns, name) in &state.gateways {
            objects.insert(
                ("Gateway".to_string(), ns.clone(), name.clone()),
                gateway_object(ns, name),
            );
        }
    }

    let ob = state.onboarding.clone();
    kube.expect_get_onboarding()
        .returning(move |_, _| Ok(ob.clone()));

    let added = captured.finalizers_added.clone();
    kube.expect_add_finalizer().returning(move |_, _, _| {
        *added.lock().unwrap() += 1;
        Ok(())
    });

    let removed = captured.finalizers_removed.clone();
    kube.expect_remove_finalizer().returning(move |_, _, _| {
        *removed.lock().unwrap() += 1;
        Ok(())
    });

    let statuses = captured.statuses.clone();
    kube.expect_patch_status().returning(move |_, _, status| {
        // Record what the API server would decode from the wire body
        let body = crate::kube_client::status_patch(status);
        let decoded = serde_json::from_value(body["status"].clone()).unwrap();
        statuses.lock().unwrap().push(decoded);
        Ok(())
    });

    let ns = state.namespace.clone();
    kube.expect_get_namespace()
        .returning(move |_| Ok(ns.clone()));

    let svc = state.service.clone();
    kube.expect_get_service()
        .returning(move |_, _| Ok(svc.clone()));

    let secrets = state.secrets.clone();
    let applied = captured.secrets.clone();
    kube.expect_get_secret().returning(move |ns, name| {
        let written = applied.lock().unwrap();
        Ok(written
            .iter()
            .chain(secrets.iter())
            .find(|s| {
                s.metadata.namespace.as_deref() == Some(ns) && s.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    });

    let applied = captured.secrets.clone();
    kube.expect_apply_secret().returning(move |secret| {
        applied.lock().unwrap().insert(0, secret.clone());
        Ok(())
    });

    let objects = captured.objects.clone();
    kube.expect_get_object().returning(move |ar, ns, name| {
        Ok(objects
            .lock()
            .unwrap()
            .get(&(ar.kind.clone(), ns.to_string(), name.to_string()))
            .cloned())
    });

    let objects = captured.objects.clone();
    let writes = captured.writes.clone();
    kube.expect_create_object().returning(move |ar, ns, obj| {
        let key = (
            ar.kind.clone(),
            ns.to_string(),
            obj.metadata.name.clone().unwrap_or_default(),
        );
        writes.lock().unwrap().push(key.clone());
        objects.lock().unwrap().insert(key, obj.clone());
        Ok(())
    });

    let objects = captured.objects.clone();
    let writes = captured.writes.clone();
    kube.expect_replace_object().returning(move |ar, ns, name, obj| {
        let key = (ar.kind.clone(), ns.to_string(), name.to_string());
        writes.lock().unwrap().push(key.clone());
        objects.lock().unwrap().insert(key, obj.clone());
        Ok(())
    });

    let objects = captured.objects.clone();
    let deleted = captured.deleted.clone();
    kube.expect_delete_object().returning(move |ar, ns, name| {
        let key = (ar.kind.clone(), ns.to_string(), name.to_string());
        objects.lock().unwrap().remove(&key);
        deleted.lock().unwrap().push(key);
        Ok(())
    });

    (kube, captured)
}

/// Event sink that keeps every published event in memory
#[derive(Default)]
pub struct RecordedEvents {
    events: Mutex<Vec<(String, OnboardingEvent)>>,
}

impl RecordedEvents {
    /// Events published so far, keyed by AppOnboarding name
    pub fn all(&self) -> Vec<(String, OnboardingEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Reasons of every event, in publish order
    pub fn reasons(&self) -> Vec<&'static str> {
        self.all().into_iter().map(|(_, e)| e.reason).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordedEvents {
    async fn publish(&self, onboarding: &AppOnboarding, event: OnboardingEvent) {
        self.events
            .lock()
            .unwrap()
            .push((onboarding.name_any(), event));
    }
}
