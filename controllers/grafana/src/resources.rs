//! Reads and status/finalizer writes for the operator's own custom resources.
//!
//! Both writes are merge patches carrying the object's resourceVersion, so a concurrent
//! writer makes them fail with a 409 conflict instead of being silently overwritten.

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ControllerError;

#[async_trait]
pub trait ResourceClient<K>: Send + Sync {
    /// Fresh copy of the object, `None` once it is gone
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ControllerError>;

    /// Writes `object.status`
    async fn write_status(&self, object: &K) -> Result<(), ControllerError>;

    /// Replaces the finalizer list of `object`
    async fn write_finalizers(&self, object: &K, finalizers: Vec<String>) -> Result<(), ControllerError>;
}

/// [`ResourceClient`] backed by the Kubernetes API
pub struct KubeResourceClient<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeResourceClient<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

fn object_key<K: Resource>(object: &K) -> Result<(String, String), ControllerError> {
    let namespace = object
        .meta()
        .namespace
        .clone()
        .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;
    let name = object
        .meta()
        .name
        .clone()
        .ok_or(ControllerError::MissingObjectKey(".metadata.name"))?;
    Ok((namespace, name))
}

#[async_trait]
impl<K> ResourceClient<K> for KubeResourceClient<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ControllerError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn write_status(&self, object: &K) -> Result<(), ControllerError> {
        let (namespace, name) = object_key(object)?;
        let status = serde_json::to_value(object)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        let patch = json!({
            "metadata": { "resourceVersion": object.resource_version() },
            "status": status,
        });

        debug!("Writing status of {} {}/{}", K::kind(&()), namespace, name);
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn write_finalizers(&self, object: &K, finalizers: Vec<String>) -> Result<(), ControllerError> {
        let (namespace, name) = object_key(object)?;
        let patch = json!({
            "metadata": {
                "resourceVersion": object.resource_version(),
                "finalizers": finalizers,
            },
        });

        debug!("Writing finalizers of {} {}/{}: {:?}", K::kind(&()), namespace, name, finalizers);
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
