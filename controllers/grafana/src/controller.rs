//! Main controller implementation.
//!
//! Builds the shared services once (Kubernetes clients, ConfigStore, metrics, HTTP
//! client), hands them to both reconcilers and runs the watchers next to the metrics
//! endpoint until one of them exits.

use std::sync::Arc;

use crds::{Grafana, GrafanaDashboard};
use grafana_client::{GrafanaHttpClient, GrafanaHttpClientTrait};
use kube::Client;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cluster::{ClusterClient, KubeClusterClient};
use crate::config::ConfigStore;
use crate::dashboard::DashboardController;
use crate::dashboard::store::ConfigMapDashboardStore;
use crate::error::ControllerError;
use crate::events::KubeEventSink;
use crate::metrics::{self, Metrics};
use crate::reconciler::grafana::GrafanaController;
use crate::resources::{KubeResourceClient, ResourceClient};
use crate::settings::OperatorSettings;
use crate::watcher::Watcher;

/// Running Grafana operator
pub struct Controller {
    grafana_watcher: JoinHandle<Result<(), ControllerError>>,
    dashboard_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Wires every component and starts the watchers.
    pub async fn new(settings: OperatorSettings) -> Result<Self, ControllerError> {
        info!("Initializing Grafana operator");

        let kube_client = Client::try_default().await?;

        let config = Arc::new(ConfigStore::new());
        settings.seed(&config);
        let ini_template = settings.load_ini_template()?;
        let metrics = Arc::new(Metrics::new()?);

        let http: Arc<dyn GrafanaHttpClientTrait> =
            Arc::new(GrafanaHttpClient::new(settings.plugins_url.clone())?);
        let cluster: Arc<dyn ClusterClient> = Arc::new(KubeClusterClient::new(kube_client.clone()));
        let grafanas: Arc<dyn ResourceClient<Grafana>> =
            Arc::new(KubeResourceClient::<Grafana>::new(kube_client.clone()));
        let dashboards: Arc<dyn ResourceClient<GrafanaDashboard>> =
            Arc::new(KubeResourceClient::<GrafanaDashboard>::new(kube_client.clone()));

        let grafana_controller = Arc::new(GrafanaController::new(
            cluster.clone(),
            grafanas,
            Arc::new(KubeEventSink::new(kube_client.clone())),
            http.clone(),
            config.clone(),
            ini_template,
            metrics.clone(),
        ));
        let dashboard_controller = Arc::new(DashboardController::new(
            dashboards,
            Arc::new(ConfigMapDashboardStore::new(cluster, config.clone())),
            http,
            config,
            metrics.clone(),
        ));

        let watcher_instance = Arc::new(Watcher::new(
            kube_client,
            settings.watch_namespace.clone(),
            grafana_controller,
            dashboard_controller,
        ));

        let grafana_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_grafanas().await })
        };
        let dashboard_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_dashboards().await })
        };
        let metrics_server = tokio::spawn(metrics::serve(settings.metrics_addr, metrics.clone()));

        metrics.set_ready();
        Ok(Self {
            grafana_watcher,
            dashboard_watcher,
            metrics_server,
        })
    }

    /// Runs until a watcher or the metrics server exits
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Grafana operator running");

        tokio::select! {
            result = &mut self.grafana_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Grafana watcher panicked: {}", e)))??;
            }
            result = &mut self.dashboard_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("GrafanaDashboard watcher panicked: {}", e)))??;
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))??;
            }
        }

        info!("Grafana operator stopped");
        Ok(())
    }
}
