//! Grafana controller.
//!
//! One pass:
//! 1. re-read the Grafana and publish its namespace and dashboard selectors
//! 2. apply pending plugin requests to `status.installedPlugins` (rate limited)
//! 3. read the managed objects, compute the actions and run them in order
//! 4. write the status and requeue
//!
//! Failures record a Warning event and a `Failing` phase before being handed to the
//! scheduler for a backoff retry.

use std::sync::Arc;

use chrono::Utc;
use crds::{Grafana, GrafanaPhase, GrafanaPlugin, PluginList};
use grafana_client::GrafanaHttpClientTrait;
use kube::{Resource, ResourceExt};
use tracing::{debug, error, info, warn};

use super::GrafanaReconciler;
use crate::cluster::ClusterClient;
use crate::cluster::actions::ActionRunner;
use crate::cluster::state::ClusterState;
use crate::config::{ConfigStore, Setting};
use crate::constants::REQUEUE_DELAY;
use crate::error::ControllerError;
use crate::events::{EventSink, PROCESSING_ERROR};
use crate::metrics::Metrics;
use crate::plugins::{RequesterIndex, can_update_plugins, resolve};
use crate::reconcile_helpers::{ReconcileOutcome, object_key};
use crate::resources::ResourceClient;

const CONTROLLER: &str = "grafana";

pub struct GrafanaController {
    cluster: Arc<dyn ClusterClient>,
    grafanas: Arc<dyn ResourceClient<Grafana>>,
    events: Arc<dyn EventSink>,
    registry: Arc<dyn GrafanaHttpClientTrait>,
    config: Arc<ConfigStore>,
    ini_template: Option<String>,
    metrics: Arc<Metrics>,
}

impl GrafanaController {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        grafanas: Arc<dyn ResourceClient<Grafana>>,
        events: Arc<dyn EventSink>,
        registry: Arc<dyn GrafanaHttpClientTrait>,
        config: Arc<ConfigStore>,
        ini_template: Option<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cluster,
            grafanas,
            events,
            registry,
            config,
            ini_template,
            metrics,
        }
    }

    pub async fn reconcile(&self, grafana: &Grafana) -> Result<ReconcileOutcome, ControllerError> {
        let namespace = grafana
            .namespace()
            .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;
        let name = grafana.name_any();
        info!("Reconciling Grafana {}/{}", namespace, name);

        let Some(mut grafana) = self.grafanas.get(&namespace, &name).await? else {
            info!("Grafana {}/{} is gone, pausing dashboard imports", namespace, name);
            self.config.clear_dashboard_selectors();
            return Ok(ReconcileOutcome::Done);
        };

        self.config.set(Setting::OperatorNamespace, namespace);
        self.config
            .set_dashboard_selectors(grafana.spec.dashboard_label_selector.clone());

        match self.apply(&mut grafana).await {
            Ok(()) => self.manage_success(grafana).await,
            Err(issue) => self.manage_error(grafana, issue).await,
        }
    }

    async fn apply(&self, grafana: &mut Grafana) -> Result<(), ControllerError> {
        self.apply_plugins(grafana).await;

        let state = ClusterState::read(self.cluster.as_ref(), grafana).await?;
        let desired = GrafanaReconciler::new(&self.config, self.ini_template.as_deref())
            .reconcile(grafana, &state);
        debug!("Running {} actions for Grafana {}", desired.actions.len(), object_key(grafana));

        ActionRunner::new(self.cluster.as_ref(), grafana)?
            .with_metrics(self.metrics.clone())
            .run_all(desired.actions)
            .await?;

        if let Some(hash) = desired.config_hash {
            grafana.status.get_or_insert_with(Default::default).last_config = Some(hash);
        }
        Ok(())
    }

    /// Resolves every registered plugin request against the installed set.
    ///
    /// The result lands in the in-memory status so this pass's Deployment already carries
    /// it. The installed and failed sets are always published for the dashboard controller.
    async fn apply_plugins(&self, grafana: &mut Grafana) {
        let status = grafana.status.get_or_insert_with(Default::default);

        if can_update_plugins(self.config.plugins_updated(), Utc::now()) {
            let registry = self.config.plugin_registry();
            let requested = self.config.requested_plugins();
            let resolution = resolve(
                &requested,
                &status.installed_plugins,
                &status.installed_plugins,
                &status.failed_plugins,
                &RequesterIndex::from_registry(&registry),
            );
            for note in &resolution.notes {
                debug!("Plugin resolution: {}", note.message);
            }

            if resolution.changed {
                let mut failed = status.failed_plugins.clone();
                let installed = self
                    .verify_plugins(&status.installed_plugins, resolution.plugins, &mut failed)
                    .await;
                info!(
                    "Installed plugins changed from [{}] to [{}]",
                    status.installed_plugins.to_env(),
                    installed.to_env()
                );
                status.installed_plugins = installed;
                status.failed_plugins = failed;
            }
        }

        self.config
            .set_plugin_state(status.installed_plugins.clone(), status.failed_plugins.clone());
        self.metrics
            .set_registered_dashboards(self.config.registered_origins());
    }

    /// Checks plugins that are not installed yet against the catalogue.
    ///
    /// Unknown releases move to `failed`. When the catalogue cannot be reached the
    /// currently installed release (if any) is kept and the check runs again next pass.
    async fn verify_plugins(
        &self,
        installed: &PluginList,
        accepted: PluginList,
        failed: &mut PluginList,
    ) -> PluginList {
        let mut verified = PluginList::new();
        for plugin in accepted.into_inner() {
            if installed.has_exact_version_of(&plugin) {
                verified.push(plugin);
                continue;
            }
            match self.registry.plugin_exists(&plugin.name, &plugin.version).await {
                Ok(true) => verified.push(plugin),
                Ok(false) => {
                    warn!("Plugin {} does not exist, not installing it", plugin);
                    failed.push(GrafanaPlugin { origin: None, ..plugin });
                }
                Err(e) => {
                    warn!("Unable to verify plugin {}: {}", plugin, e);
                    if let Some(current) = installed.installed_version_of(&plugin) {
                        verified.push(current.clone());
                    }
                }
            }
        }
        verified
    }

    async fn manage_success(&self, mut grafana: Grafana) -> Result<ReconcileOutcome, ControllerError> {
        grafana.status.get_or_insert_with(Default::default).phase = GrafanaPhase::Reconciling;
        match self.grafanas.write_status(&grafana).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                debug!("Status of Grafana {} changed concurrently, keeping theirs", object_key(&grafana));
            }
            Err(e) => return self.manage_error(grafana, e).await,
        }

        self.metrics.record_reconcile(CONTROLLER, "success");
        info!("Grafana {} reconciled", object_key(&grafana));
        Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY))
    }

    /// Records the failure on the Grafana and returns it to the scheduler.
    ///
    /// A conflicting status write means another writer already moved the object on, so
    /// the pass ends as a plain requeue instead of an error.
    async fn manage_error(
        &self,
        mut grafana: Grafana,
        issue: ControllerError,
    ) -> Result<ReconcileOutcome, ControllerError> {
        error!("Error reconciling Grafana {}: {}", object_key(&grafana), issue);
        self.events
            .warning(&grafana.object_ref(&()), PROCESSING_ERROR, issue.to_string())
            .await;
        self.metrics.record_reconcile(CONTROLLER, "error");

        grafana.status.get_or_insert_with(Default::default).phase = GrafanaPhase::Failing;
        match self.grafanas.write_status(&grafana).await {
            Ok(()) => Err(issue),
            Err(e) if e.is_conflict() => {
                debug!("Status of Grafana {} changed concurrently, keeping theirs", object_key(&grafana));
                Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY))
            }
            Err(e) => {
                error!("Failed to write status of Grafana {}: {}", object_key(&grafana), e);
                Err(issue)
            }
        }
    }
}
