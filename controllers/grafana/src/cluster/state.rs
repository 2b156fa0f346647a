//! Snapshot of the objects managed for one Grafana.

use crds::Grafana;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::debug;

use super::{ClusterClient, ClusterError, ManagedKind, ManagedObject};
use crate::constants::{
    GRAFANA_CONFIG_MAP_NAME, GRAFANA_DASHBOARDS_CONFIG_MAP_NAME, GRAFANA_DEPLOYMENT_NAME,
    GRAFANA_INGRESS_NAME, GRAFANA_SERVICE_ACCOUNT_NAME, GRAFANA_SERVICE_NAME,
};
use crate::error::ControllerError;

/// Current managed objects. `None` means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterState {
    pub service: Option<Service>,
    pub service_account: Option<ServiceAccount>,
    pub config: Option<ConfigMap>,
    pub dashboards_config: Option<ConfigMap>,
    pub deployment: Option<Deployment>,
    pub ingress: Option<Ingress>,
}

impl ClusterState {
    /// Reads every managed object in the Grafana's namespace.
    ///
    /// Absent objects are `None`. Any other read error aborts the whole snapshot.
    pub async fn read(client: &dyn ClusterClient, grafana: &Grafana) -> Result<Self, ControllerError> {
        let namespace = grafana
            .namespace()
            .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;

        let state = Self {
            service: read_optional(client, ManagedKind::Service, &namespace, GRAFANA_SERVICE_NAME)
                .await?
                .and_then(ManagedObject::into_service),
            service_account: read_optional(
                client,
                ManagedKind::ServiceAccount,
                &namespace,
                GRAFANA_SERVICE_ACCOUNT_NAME,
            )
            .await?
            .and_then(ManagedObject::into_service_account),
            config: read_optional(client, ManagedKind::ConfigMap, &namespace, GRAFANA_CONFIG_MAP_NAME)
                .await?
                .and_then(ManagedObject::into_config_map),
            dashboards_config: read_optional(
                client,
                ManagedKind::ConfigMap,
                &namespace,
                GRAFANA_DASHBOARDS_CONFIG_MAP_NAME,
            )
            .await?
            .and_then(ManagedObject::into_config_map),
            deployment: read_optional(client, ManagedKind::Deployment, &namespace, GRAFANA_DEPLOYMENT_NAME)
                .await?
                .and_then(ManagedObject::into_deployment),
            ingress: read_optional(client, ManagedKind::Ingress, &namespace, GRAFANA_INGRESS_NAME)
                .await?
                .and_then(ManagedObject::into_ingress),
        };
        debug!("Cluster state for Grafana {}/{}: {:?}", namespace, grafana.name_any(), state.summary());
        Ok(state)
    }

    /// Which objects exist, in action order
    pub fn summary(&self) -> [(&'static str, bool); 6] {
        [
            ("service", self.service.is_some()),
            ("serviceaccount", self.service_account.is_some()),
            ("config", self.config.is_some()),
            ("dashboards", self.dashboards_config.is_some()),
            ("deployment", self.deployment.is_some()),
            ("ingress", self.ingress.is_some()),
        ]
    }
}

async fn read_optional(
    client: &dyn ClusterClient,
    kind: ManagedKind,
    namespace: &str,
    name: &str,
) -> Result<Option<ManagedObject>, ClusterError> {
    match client.get(kind, namespace, name).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
