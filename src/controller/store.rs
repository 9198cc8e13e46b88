//! # Object Store
//!
//! Seam between the reconciler and the Kubernetes API.
//!
//! The reconciler only talks to these traits; `KubeStore` implements them on top of
//! kube-rs so that writes carry the fetched `resourceVersion` and concurrent
//! modification surfaces as [`StoreError::Conflict`].

use crate::constants::CONTROLLER_NAME;
use crate::crd::{Dashboard, DashboardStatus};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Namespace-qualified identity of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a namespaced resource; missing namespace maps to `default`
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self::new(
            obj.namespace().unwrap_or_else(|| "default".to_string()),
            obj.name_any(),
        )
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Failure talking to the object store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic-concurrency rejection (HTTP 409); retryable
    #[error("conflict: {0}")]
    Conflict(String),
    /// Object does not exist (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other API or transport failure; not retried
    #[error("kubernetes api error: {0}")]
    Api(#[source] kube::Error),
    /// Failure reported by a non-Kubernetes store implementation
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 409 => {
                StoreError::Conflict(response.message.clone())
            }
            kube::Error::Api(response) if response.code == 404 => {
                StoreError::NotFound(response.message.clone())
            }
            _ => StoreError::Api(error),
        }
    }
}

/// Read and write access to one kind of namespaced object
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch an object; `Ok(None)` when it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// Create an object; an existing object yields [`StoreError::Conflict`]
    async fn create(&self, key: &ObjectKey, obj: &K) -> Result<K, StoreError>;

    /// Replace an object; a stale `resourceVersion` yields [`StoreError::Conflict`]
    async fn replace(&self, key: &ObjectKey, obj: &K) -> Result<K, StoreError>;
}

/// Writes the Dashboard status sub-resource
#[async_trait]
pub trait StatusWriter: Send + Sync {
    /// Write `status` guarded by `resource_version`; a stale version yields
    /// [`StoreError::Conflict`]
    async fn update_status(
        &self,
        key: &ObjectKey,
        resource_version: Option<&str>,
        status: &DashboardStatus,
    ) -> Result<Dashboard, StoreError>;
}

/// kube-rs backed store
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + fmt::Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let api: Api<K> = self.api(&key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn create(&self, key: &ObjectKey, obj: &K) -> Result<K, StoreError> {
        let api: Api<K> = self.api(&key.namespace);
        let pp = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        Ok(api.create(&pp, obj).await?)
    }

    async fn replace(&self, key: &ObjectKey, obj: &K) -> Result<K, StoreError> {
        let api: Api<K> = self.api(&key.namespace);
        let pp = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        Ok(api.replace(&key.name, &pp, obj).await?)
    }
}

#[async_trait]
impl StatusWriter for KubeStore {
    async fn update_status(
        &self,
        key: &ObjectKey,
        resource_version: Option<&str>,
        status: &DashboardStatus,
    ) -> Result<Dashboard, StoreError> {
        let api: Api<Dashboard> = self.api(&key.namespace);

        // CRITICAL: resourceVersion in a merge patch is a precondition; the API server
        // answers 409 when the object moved on since it was read
        let patch = match resource_version {
            Some(rv) => serde_json::json!({
                "metadata": { "resourceVersion": rv },
                "status": status,
            }),
            None => serde_json::json!({ "status": status }),
        };

        Ok(api
            .patch_status(
                &key.name,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?)
    }
}
