//! GrafanaDashboard controller.
//!
//! - `lifecycle`: phase state machine
//! - `store`: where imported dashboards are written
//!
//! Dashboards are only imported once a Grafana has published its dashboard selectors,
//! and only when their labels match one of them. Unmatched dashboards are looked at
//! again after the requeue delay. Deletion is handled first, whatever
//! the labels, so a dashboard never stays stuck on its finalizer.

pub mod lifecycle;
pub mod store;


use std::sync::Arc;

use chrono::Utc;
use crds::{GrafanaDashboard, GrafanaDashboardStatus, PluginList};
use grafana_client::GrafanaHttpClientTrait;
use kube::{Resource, ResourceExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::constants::{REQUEUE_DELAY, RESOURCE_FINALIZER_NAME};
use crate::error::ControllerError;
use crate::hash::content_hash;
use crate::metrics::Metrics;
use crate::plugins::{RequesterIndex, resolve};
use crate::reconcile_helpers::{ReconcileOutcome, object_key};
use crate::resources::ResourceClient;
use lifecycle::{Effect, Observation, transition};
use store::DashboardStore;

const CONTROLLER: &str = "dashboard";

pub struct DashboardController {
    dashboards: Arc<dyn ResourceClient<GrafanaDashboard>>,
    store: Arc<dyn DashboardStore>,
    sources: Arc<dyn GrafanaHttpClientTrait>,
    config: Arc<ConfigStore>,
    metrics: Arc<Metrics>,
}

impl DashboardController {
    pub fn new(
        dashboards: Arc<dyn ResourceClient<GrafanaDashboard>>,
        store: Arc<dyn DashboardStore>,
        sources: Arc<dyn GrafanaHttpClientTrait>,
        config: Arc<ConfigStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            dashboards,
            store,
            sources,
            config,
            metrics,
        }
    }

    pub async fn reconcile(&self, dashboard: &GrafanaDashboard) -> Result<ReconcileOutcome, ControllerError> {
        let result = self.reconcile_dashboard(dashboard).await;
        let label = if result.is_ok() { "success" } else { "error" };
        self.metrics.record_reconcile(CONTROLLER, label);
        result
    }

    async fn reconcile_dashboard(&self, dashboard: &GrafanaDashboard) -> Result<ReconcileOutcome, ControllerError> {
        let namespace = dashboard
            .namespace()
            .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;
        let name = dashboard.name_any();
        debug!("Reconciling GrafanaDashboard {}/{}", namespace, name);

        let Some(mut dashboard) = self.dashboards.get(&namespace, &name).await? else {
            debug!("GrafanaDashboard {}/{} is gone", namespace, name);
            return Ok(ReconcileOutcome::Done);
        };

        let observation = Observation {
            deleting: dashboard.meta().deletion_timestamp.is_some(),
            has_finalizer: dashboard.has_finalizer(RESOURCE_FINALIZER_NAME),
        };
        if observation.deleting {
            return self.cleanup(&dashboard).await;
        }

        let Some(selectors) = self.config.dashboard_selectors() else {
            debug!("No dashboard selectors published yet, retrying {}/{} later", namespace, name);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
        };
        if !dashboard.matches_selectors(&selectors)? {
            debug!("GrafanaDashboard {}/{} does not match any selector", namespace, name);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
        }

        let step = transition(dashboard.phase(), observation);
        match step.effect {
            Effect::PersistPhase => {
                info!("GrafanaDashboard {}/{} moves to phase {:?}", namespace, name, step.next);
                dashboard.status.get_or_insert_with(Default::default).phase = step.next;
                self.persist_status(&dashboard).await?;
                Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY))
            }
            Effect::RegisterFinalizer => {
                info!("Registering finalizer on GrafanaDashboard {}/{}", namespace, name);
                let mut finalizers = dashboard.finalizers().to_vec();
                finalizers.push(RESOURCE_FINALIZER_NAME.to_string());
                self.dashboards.write_finalizers(&dashboard, finalizers).await?;
                Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY))
            }
            Effect::Import => self.import(dashboard).await,
            Effect::Cleanup => self.cleanup(&dashboard).await,
        }
    }

    async fn import(&self, mut dashboard: GrafanaDashboard) -> Result<ReconcileOutcome, ControllerError> {
        if self.config.operator_namespace().is_none() {
            return Err(ControllerError::NotReady("operator namespace is not known yet".to_string()));
        }

        let key = object_key(&dashboard);
        if !dashboard.has_valid_name() {
            warn!("GrafanaDashboard {} has an invalid name '{}'", key, dashboard.spec.name);
            let mut status = dashboard.status.clone().unwrap_or_default();
            let message = format!("invalid dashboard name '{}'", dashboard.spec.name);
            if status.append_message(message, Utc::now()) {
                dashboard.status = Some(status);
                self.persist_status(&dashboard).await?;
            }
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
        }

        let hash = content_hash(&[
            dashboard.spec.json.as_str(),
            dashboard.spec.url.as_deref().unwrap_or_default(),
        ]);
        let mut status = dashboard.status.clone().unwrap_or_default();

        if status.last_config.as_deref() == Some(hash.as_str()) {
            if status.rejected_config.as_deref() == Some(hash.as_str()) {
                debug!("GrafanaDashboard {} content was rejected before, waiting for a change", key);
                return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
            }
            if self.store.is_known(&dashboard).await? {
                debug!("GrafanaDashboard {} is unchanged", key);
                return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
            }
        }

        let content = self.fetch_content(&dashboard).await;
        let now = Utc::now();

        if let Err(reason) = validate_content(&content) {
            warn!("GrafanaDashboard {} has invalid content: {}", key, reason);
            status.last_config = Some(hash.clone());
            status.rejected_config = Some(hash);
            status.append_message(format!("invalid dashboard content: {}", reason), now);
            dashboard.status = Some(status);
            self.persist_status(&dashboard).await?;
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
        }

        self.resolve_plugins(&dashboard, &mut status);

        if !self.store.upsert(&dashboard, &content).await? {
            info!("Dashboards store is not ready, retrying {} later", key);
            dashboard.status = Some(status);
            self.persist_status(&dashboard).await?;
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
        }

        info!("Imported GrafanaDashboard {}", key);
        status.last_config = Some(hash);
        status.rejected_config = None;
        status.append_message("dashboard imported", now);
        dashboard.status = Some(status);
        self.persist_status(&dashboard).await?;
        Ok(ReconcileOutcome::RequeueAfter(REQUEUE_DELAY))
    }

    /// Remote content when reachable, the inline JSON otherwise
    async fn fetch_content(&self, dashboard: &GrafanaDashboard) -> String {
        let Some(url) = dashboard.spec.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return dashboard.spec.json.clone();
        };
        match self.sources.fetch_dashboard(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    "Failed to fetch dashboard {} from {}, using inline content: {}",
                    object_key(dashboard),
                    url,
                    e
                );
                dashboard.spec.json.clone()
            }
        }
    }

    /// Registers this dashboard's plugin request and records the per-dashboard resolution
    fn resolve_plugins(&self, dashboard: &GrafanaDashboard, status: &mut GrafanaDashboardStatus) {
        let origin = dashboard.dashboard_id();
        let (requested, _) = dashboard.requested_plugins().collapse_latest();
        let (installed, failed) = self.config.plugin_state();
        let requesters = RequesterIndex::from_registry(&self.config.plugin_registry())
            .with_request(&origin, &requested);

        let resolution = resolve(&requested, &status.installed_plugins, &installed, &failed, &requesters);
        let now = Utc::now();
        for note in &resolution.notes {
            status.append_message(note.message.clone(), now);
        }
        if resolution.changed {
            info!(
                "Plugins of GrafanaDashboard {} changed to [{}]",
                object_key(dashboard),
                resolution.plugins.to_env()
            );
            status.installed_plugins = resolution.plugins;
        }
        status.failed_plugins = requested
            .iter()
            .filter(|p| failed.has_exact_version_of(p))
            .cloned()
            .collect::<PluginList>();

        if self.config.set_plugins_for(&origin, requested) {
            debug!("Plugin request of {} registered", origin);
        }
        self.metrics
            .set_registered_dashboards(self.config.registered_origins());
    }

    /// Removes the dashboard downstream and releases our finalizer.
    ///
    /// A dashboard without our finalizer is already cleaned up. The finalizer is kept
    /// until the store removal went through.
    async fn cleanup(&self, dashboard: &GrafanaDashboard) -> Result<ReconcileOutcome, ControllerError> {
        let key = object_key(dashboard);
        if !dashboard.has_finalizer(RESOURCE_FINALIZER_NAME) {
            debug!("GrafanaDashboard {} is already cleaned up", key);
            return Ok(ReconcileOutcome::Done);
        }

        if self.config.operator_namespace().is_none() {
            return Err(ControllerError::NotReady("operator namespace is not known yet".to_string()));
        }
        self.store.remove(dashboard).await?;

        if self.config.remove_plugins_for(&dashboard.dashboard_id()) {
            info!("Removed plugin request of GrafanaDashboard {}", key);
        }
        self.metrics
            .set_registered_dashboards(self.config.registered_origins());

        let finalizers = dashboard
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != RESOURCE_FINALIZER_NAME)
            .cloned()
            .collect();
        self.dashboards.write_finalizers(dashboard, finalizers).await?;
        info!("GrafanaDashboard {} cleaned up", key);
        Ok(ReconcileOutcome::Done)
    }

    /// Status writes lose to concurrent writers; the next pass sees their version
    async fn persist_status(&self, dashboard: &GrafanaDashboard) -> Result<(), ControllerError> {
        match self.dashboards.write_status(dashboard).await {
            Err(e) if e.is_conflict() => {
                debug!("Status of GrafanaDashboard {} changed concurrently", object_key(dashboard));
                Ok(())
            }
            other => other,
        }
    }
}

/// Dashboard content must be a JSON object
pub fn validate_content(content: &str) -> Result<(), String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(_)) => Ok(()),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}
