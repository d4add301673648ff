//! Shared helpers for derived Kubernetes objects
//!
//! Derived objects (HTTPRoute, SecurityPolicy) are modelled as plain serde
//! types and written through the dynamic API. This module holds their shared
//! metadata type, the `HasApiResource` trait that ties a type to its
//! `ApiResource`, and the get-or-create upsert used for both.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use tracing::debug;

use crate::crd::AppOnboarding;
use crate::kube_client::KubeClient;
use crate::{Error, LABEL_MANAGED_BY, LABEL_MANAGED_BY_PORTICO, LABEL_ONBOARDING};

// =============================================================================
// ObjectMeta
// =============================================================================

/// Metadata for derived objects.
///
/// Maps keep labels and annotations in sorted order so an unchanged spec
/// always serializes to the same bytes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Owner references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Create new metadata with the portico managed-by label
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_PORTICO.to_string(),
        );
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels,
            annotations: BTreeMap::new(),
            owner_references: Vec::new(),
        }
    }

    /// Metadata for an object derived from (and owned by) an AppOnboarding
    pub fn owned_by(name: impl Into<String>, owner: &AppOnboarding) -> Result<Self, Error> {
        let owner_ref = controller_owner_ref(owner)?;
        Ok(Self::new(name, owner.namespace().unwrap_or_default())
            .with_label(LABEL_ONBOARDING, owner.name_any())
            .with_owner(owner_ref))
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Add an owner reference
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner_references.push(owner);
        self
    }
}

/// Controller owner reference pointing at an AppOnboarding
pub fn controller_owner_ref(owner: &AppOnboarding) -> Result<OwnerReference, Error> {
    owner.controller_owner_ref(&()).ok_or_else(|| {
        Error::internal(format!(
            "AppOnboarding {} has no uid, cannot own derived objects",
            owner.name_any()
        ))
    })
}

// =============================================================================
// HasApiResource
// =============================================================================

/// Trait for types that have a known API group, version, and kind.
///
/// The `ApiResource` used for dynamic API calls is derived from the same
/// constants the type serializes, so the two never drift apart.
pub trait HasApiResource {
    /// Full API version (e.g., "gateway.networking.k8s.io/v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "HTTPRoute")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Generate `default_api_version`/`default_kind` helpers for serde defaults
#[macro_export]
macro_rules! impl_api_defaults {
    ($type:ty) => {
        impl $type {
            fn default_api_version() -> String {
                <Self as $crate::kube_utils::HasApiResource>::API_VERSION.to_string()
            }
            fn default_kind() -> String {
                <Self as $crate::kube_utils::HasApiResource>::KIND.to_string()
            }
        }
    };
}

/// Build an ApiResource from an apiVersion and kind
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    };
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Pluralize a Kubernetes resource kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Convert a typed derived object to a DynamicObject
pub fn to_dynamic<T: Serialize>(obj: &T) -> Result<DynamicObject, Error> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

// =============================================================================
// Upsert
// =============================================================================

/// What an upsert did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Object did not exist and was created
    Created,
    /// Object existed and its spec was overwritten
    Updated,
    /// Someone else wrote the object concurrently; the next pass retries
    Conflicted,
}

/// Which step of an upsert failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertStage {
    /// Creating a missing object
    Create,
    /// Reading or replacing an existing object
    Update,
}

/// Failed upsert
#[derive(Debug)]
pub struct UpsertError {
    /// Step that failed
    pub stage: UpsertStage,
    /// Underlying error
    pub source: Error,
}

/// Get-or-create a derived object by name, overwriting an existing object.
///
/// Write conflicts are reported as [`UpsertOutcome::Conflicted`] rather than
/// an error; the object is re-derived on the next reconcile.
pub async fn upsert<T>(kube: &dyn KubeClient, desired: &T) -> Result<UpsertOutcome, UpsertError>
where
    T: HasApiResource + Serialize,
{
    let ar = T::api_resource();
    let mut obj = to_dynamic(desired).map_err(|source| UpsertError {
        stage: UpsertStage::Create,
        source,
    })?;
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let existing = kube
        .get_object(&ar, &namespace, &name)
        .await
        .map_err(|source| UpsertError {
            stage: UpsertStage::Update,
            source,
        })?;

    let (stage, result) = match existing {
        None => (
            UpsertStage::Create,
            kube.create_object(&ar, &namespace, &obj).await,
        ),
        Some(current) => {
            obj.metadata.resource_version = current.metadata.resource_version;
            (
                UpsertStage::Update,
                kube.replace_object(&ar, &namespace, &name, &obj).await,
            )
        }
    };

    match result {
        Ok(()) if stage == UpsertStage::Create => Ok(UpsertOutcome::Created),
        Ok(()) => Ok(UpsertOutcome::Updated),
        Err(e) if e.is_conflict() => {
            debug!(kind = %ar.kind, %namespace, %name, "write conflict, deferring to next reconcile");
            Ok(UpsertOutcome::Conflicted)
        }
        Err(source) => Err(UpsertError { stage, source }),
    }
}
