//! Kubernetes API access for the controller
//!
//! All reads and writes go through the [`KubeClient`] trait so reconcile
//! logic can be exercised against mockall mocks without an API server.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret, Service};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;
use serde_json::json;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::{AppOnboarding, AppOnboardingStatus};
use crate::{Error, FIELD_MANAGER};

/// Merge patch body replacing the whole status of an AppOnboarding
///
/// Every status field is present in the body; unset fields are `null` and
/// are removed by the API server.
pub fn status_patch(status: &AppOnboardingStatus) -> serde_json::Value {
    json!({ "status": status })
}

/// Trait abstracting the Kubernetes operations the controller needs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch an AppOnboarding, `None` if it no longer exists
    async fn get_onboarding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AppOnboarding>, Error>;

    /// Add a finalizer to an AppOnboarding if absent
    async fn add_finalizer(&self, namespace: &str, name: &str, finalizer: &str)
        -> Result<(), Error>;

    /// Remove a finalizer from an AppOnboarding if present
    async fn remove_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error>;

    /// Replace the status subresource of an AppOnboarding
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &AppOnboardingStatus,
    ) -> Result<(), Error>;

    /// Get a Namespace
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    /// Get a Service
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error>;

    /// Get a Secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create or overwrite a Secret via server-side apply
    async fn apply_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Get a dynamically typed object
    async fn get_object(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error>;

    /// Create a dynamically typed object; 409 surfaces as [`Error::Conflict`]
    async fn create_object(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<(), Error>;

    /// Replace a dynamically typed object; 409 surfaces as [`Error::Conflict`]
    async fn replace_object(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        obj: &DynamicObject,
    ) -> Result<(), Error>;

    /// Delete a dynamically typed object; already gone is success
    async fn delete_object(&self, ar: &ApiResource, namespace: &str, name: &str)
        -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn onboardings(&self, namespace: &str) -> Api<AppOnboarding> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn dynamic(&self, ar: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, ar)
    }

    async fn patch_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.onboardings(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

fn not_found_as_none<T>(result: Result<T, kube::Error>) -> Result<Option<T>, Error> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn conflict_or_kube(e: kube::Error, ar: &ApiResource, name: &str) -> Error {
    match e {
        kube::Error::Api(ae) if ae.code == 409 => Error::Conflict {
            kind: ar.kind.clone(),
            name: name.to_string(),
        },
        e => Error::Kube(e),
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_onboarding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AppOnboarding>, Error> {
        not_found_as_none(self.onboardings(namespace).get(name).await)
    }

    async fn add_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let current = self.onboardings(namespace).get(name).await?;
        let mut finalizers = current.metadata.finalizers.unwrap_or_default();
        if finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }
        finalizers.push(finalizer.to_string());
        self.patch_finalizers(namespace, name, finalizers).await
    }

    async fn remove_finalizer(
        &self,
        namespace: &str,
        name: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let Some(current) = not_found_as_none(self.onboardings(namespace).get(name).await)? else {
            return Ok(());
        };
        let finalizers: Vec<String> = current
            .metadata
            .finalizers
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f != finalizer)
            .collect();
        self.patch_finalizers(namespace, name, finalizers).await
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &AppOnboardingStatus,
    ) -> Result<(), Error> {
        let patch = status_patch(status);
        self.onboardings(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        not_found_as_none(api.get(name).await)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        not_found_as_none(api.get(name).await)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        not_found_as_none(api.get(name).await)
    }

    async fn apply_secret(&self, secret: &Secret) -> Result<(), Error> {
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::internal("secret has no name"))?;
        let namespace = secret
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| Error::internal("secret has no namespace"))?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(secret),
        )
        .await?;
        Ok(())
    }

    async fn get_object(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        not_found_as_none(self.dynamic(ar, namespace).get(name).await)
    }

    async fn create_object(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<(), Error> {
        let name = obj.metadata.name.clone().unwrap_or_default();
        self.dynamic(ar, namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| conflict_or_kube(e, ar, &name))?;
        Ok(())
    }

    async fn replace_object(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        obj: &DynamicObject,
    ) -> Result<(), Error> {
        self.dynamic(ar, namespace)
            .replace(name, &PostParams::default(), obj)
            .await
            .map_err(|e| conflict_or_kube(e, ar, name))?;
        Ok(())
    }

    async fn delete_object(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error> {
        match self
            .dynamic(ar, namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(kind = %ar.kind, %namespace, %name, "object already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
