//! Where imported dashboards end up.
//!
//! Grafana loads dashboards from the `grafana-dashboards` ConfigMap in the operator
//! namespace, one `<namespace>_<name>.json` key per dashboard.

use std::sync::Arc;

use async_trait::async_trait;
use crds::GrafanaDashboard;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::cluster::{ClusterClient, ManagedKind, ManagedObject};
use crate::config::ConfigStore;
use crate::constants::GRAFANA_DASHBOARDS_CONFIG_MAP_NAME;
use crate::error::ControllerError;

#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// The dashboard is present downstream
    async fn is_known(&self, dashboard: &GrafanaDashboard) -> Result<bool, ControllerError>;

    /// Stores `json` for the dashboard. `false` means nothing was applied because the
    /// store is not ready yet.
    async fn upsert(&self, dashboard: &GrafanaDashboard, json: &str) -> Result<bool, ControllerError>;

    /// Removes the dashboard; removing an absent dashboard succeeds
    async fn remove(&self, dashboard: &GrafanaDashboard) -> Result<(), ControllerError>;
}

/// Key of a dashboard in the dashboards ConfigMap.
///
/// Only dashboards with a valid `spec.name` are imported, so the key is used as is.
pub fn dashboard_file_name(dashboard: &GrafanaDashboard) -> String {
    format!("{}_{}.json", dashboard.namespace().unwrap_or_default(), dashboard.spec.name)
}

/// [`DashboardStore`] writing into the dashboards ConfigMap
pub struct ConfigMapDashboardStore {
    cluster: Arc<dyn ClusterClient>,
    config: Arc<ConfigStore>,
}

impl ConfigMapDashboardStore {
    pub fn new(cluster: Arc<dyn ClusterClient>, config: Arc<ConfigStore>) -> Self {
        Self { cluster, config }
    }

    async fn read(&self) -> Result<Option<ConfigMap>, ControllerError> {
        let namespace = self
            .config
            .operator_namespace()
            .ok_or_else(|| ControllerError::NotReady("operator namespace is not known yet".to_string()))?;
        match self
            .cluster
            .get(ManagedKind::ConfigMap, &namespace, GRAFANA_DASHBOARDS_CONFIG_MAP_NAME)
            .await
        {
            Ok(object) => Ok(object.into_config_map()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DashboardStore for ConfigMapDashboardStore {
    async fn is_known(&self, dashboard: &GrafanaDashboard) -> Result<bool, ControllerError> {
        let key = dashboard_file_name(dashboard);
        Ok(self
            .read()
            .await?
            .and_then(|cm| cm.data)
            .is_some_and(|data| data.contains_key(&key)))
    }

    async fn upsert(&self, dashboard: &GrafanaDashboard, json: &str) -> Result<bool, ControllerError> {
        let Some(mut config_map) = self.read().await? else {
            debug!("Dashboards ConfigMap does not exist yet");
            return Ok(false);
        };
        let key = dashboard_file_name(dashboard);
        let data = config_map.data.get_or_insert_with(Default::default);
        if data.get(&key).is_some_and(|current| current == json) {
            return Ok(true);
        }

        data.insert(key.clone(), json.to_string());
        self.cluster.update(&ManagedObject::ConfigMap(config_map)).await?;
        info!("Stored dashboard {}", key);
        Ok(true)
    }

    async fn remove(&self, dashboard: &GrafanaDashboard) -> Result<(), ControllerError> {
        let Some(mut config_map) = self.read().await? else {
            return Ok(());
        };
        let key = dashboard_file_name(dashboard);
        let removed = config_map
            .data
            .as_mut()
            .and_then(|data| data.remove(&key))
            .is_some();
        if !removed {
            return Ok(());
        }

        self.cluster.update(&ManagedObject::ConfigMap(config_map)).await?;
        info!("Removed dashboard {}", key);
        Ok(())
    }
}
