//! Access to the cluster objects the Grafana controller manages.
//!
//! - `state`: reads a snapshot of the managed objects for one Grafana
//! - `actions`: applies create/update actions in order

pub mod actions;
pub mod state;


use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PostParams;
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Errors from the cluster store, classified for the reconcilers
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Object (or its kind) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// resourceVersion precondition failed
    #[error("conflict: {0}")]
    Conflict(String),

    /// Object cannot be sent as is (missing name or namespace)
    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),
}

impl ClusterError {
    /// Classifies a kube error. Unregistered kinds also answer 404.
    pub fn from_kube(error: kube::Error, what: impl Into<String>) -> Self {
        match &error {
            kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound(what.into()),
            kube::Error::Api(response) if response.code == 409 => ClusterError::Conflict(what.into()),
            _ => ClusterError::Api(error),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }
}

/// Kinds of objects owned by a Grafana
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedKind {
    Service,
    ServiceAccount,
    ConfigMap,
    Deployment,
    Ingress,
}

impl ManagedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ManagedKind::Service => "Service",
            ManagedKind::ServiceAccount => "ServiceAccount",
            ManagedKind::ConfigMap => "ConfigMap",
            ManagedKind::Deployment => "Deployment",
            ManagedKind::Ingress => "Ingress",
        }
    }
}

/// A managed object of any supported kind
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedObject {
    Service(Service),
    ServiceAccount(ServiceAccount),
    ConfigMap(ConfigMap),
    Deployment(Deployment),
    Ingress(Ingress),
}

impl ManagedObject {
    pub fn kind(&self) -> ManagedKind {
        match self {
            ManagedObject::Service(_) => ManagedKind::Service,
            ManagedObject::ServiceAccount(_) => ManagedKind::ServiceAccount,
            ManagedObject::ConfigMap(_) => ManagedKind::ConfigMap,
            ManagedObject::Deployment(_) => ManagedKind::Deployment,
            ManagedObject::Ingress(_) => ManagedKind::Ingress,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ManagedObject::Service(o) => &o.metadata,
            ManagedObject::ServiceAccount(o) => &o.metadata,
            ManagedObject::ConfigMap(o) => &o.metadata,
            ManagedObject::Deployment(o) => &o.metadata,
            ManagedObject::Ingress(o) => &o.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ManagedObject::Service(o) => &mut o.metadata,
            ManagedObject::ServiceAccount(o) => &mut o.metadata,
            ManagedObject::ConfigMap(o) => &mut o.metadata,
            ManagedObject::Deployment(o) => &mut o.metadata,
            ManagedObject::Ingress(o) => &mut o.metadata,
        }
    }

    /// `Kind namespace/name`, for logs and errors
    pub fn describe(&self) -> String {
        let meta = self.meta();
        format!(
            "{} {}/{}",
            self.kind().as_str(),
            meta.namespace.as_deref().unwrap_or_default(),
            meta.name.as_deref().unwrap_or_default()
        )
    }

    pub fn into_service(self) -> Option<Service> {
        match self {
            ManagedObject::Service(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_service_account(self) -> Option<ServiceAccount> {
        match self {
            ManagedObject::ServiceAccount(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_config_map(self) -> Option<ConfigMap> {
        match self {
            ManagedObject::ConfigMap(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_deployment(self) -> Option<Deployment> {
        match self {
            ManagedObject::Deployment(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_ingress(self) -> Option<Ingress> {
        match self {
            ManagedObject::Ingress(o) => Some(o),
            _ => None,
        }
    }
}

/// Typed CRUD over managed objects
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get(&self, kind: ManagedKind, namespace: &str, name: &str) -> Result<ManagedObject, ClusterError>;

    async fn create(&self, object: &ManagedObject) -> Result<(), ClusterError>;

    /// Full replace; the object's resourceVersion is the concurrency precondition
    async fn update(&self, object: &ManagedObject) -> Result<(), ClusterError>;
}

/// [`ClusterClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_typed<K>(&self, namespace: &str, name: &str) -> Result<K, ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("{}/{}", namespace, name)))
    }

    async fn create_typed<K>(&self, object: &K) -> Result<(), ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
    {
        let (namespace, name) = object_key(object)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        debug!("Creating {} {}/{}", K::kind(&()), namespace, name);
        api.create(&PostParams::default(), object)
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::from_kube(e, format!("{}/{}", namespace, name)))
    }

    async fn replace_typed<K>(&self, object: &K) -> Result<(), ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
    {
        let (namespace, name) = object_key(object)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        debug!("Replacing {} {}/{}", K::kind(&()), namespace, name);
        api.replace(&name, &PostParams::default(), object)
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::from_kube(e, format!("{}/{}", namespace, name)))
    }
}

fn object_key<K: Resource<DynamicType = ()>>(object: &K) -> Result<(String, String), ClusterError> {
    let name = object.meta().name.clone().unwrap_or_default();
    let Some(namespace) = object.namespace() else {
        return Err(ClusterError::Invalid(format!("{} {} has no namespace", K::kind(&()), name)));
    };
    if name.is_empty() {
        return Err(ClusterError::Invalid(format!("{} in {} has no name", K::kind(&()), namespace)));
    }
    Ok((namespace, name))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(&self, kind: ManagedKind, namespace: &str, name: &str) -> Result<ManagedObject, ClusterError> {
        Ok(match kind {
            ManagedKind::Service => ManagedObject::Service(self.get_typed(namespace, name).await?),
            ManagedKind::ServiceAccount => ManagedObject::ServiceAccount(self.get_typed(namespace, name).await?),
            ManagedKind::ConfigMap => ManagedObject::ConfigMap(self.get_typed(namespace, name).await?),
            ManagedKind::Deployment => ManagedObject::Deployment(self.get_typed(namespace, name).await?),
            ManagedKind::Ingress => ManagedObject::Ingress(self.get_typed(namespace, name).await?),
        })
    }

    async fn create(&self, object: &ManagedObject) -> Result<(), ClusterError> {
        match object {
            ManagedObject::Service(o) => self.create_typed(o).await,
            ManagedObject::ServiceAccount(o) => self.create_typed(o).await,
            ManagedObject::ConfigMap(o) => self.create_typed(o).await,
            ManagedObject::Deployment(o) => self.create_typed(o).await,
            ManagedObject::Ingress(o) => self.create_typed(o).await,
        }
    }

    async fn update(&self, object: &ManagedObject) -> Result<(), ClusterError> {
        match object {
            ManagedObject::Service(o) => self.replace_typed(o).await,
            ManagedObject::ServiceAccount(o) => self.replace_typed(o).await,
            ManagedObject::ConfigMap(o) => self.replace_typed(o).await,
            ManagedObject::Deployment(o) => self.replace_typed(o).await,
            ManagedObject::Ingress(o) => self.replace_typed(o).await,
        }
    }
}
