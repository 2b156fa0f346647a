//! Reconciliation logic for the Grafana CRD.
//!
//! - `model`: desired objects and merge rules per kind
//! - `ini`: grafana.ini rendering
//! - `grafana`: the Grafana controller driving a full pass

pub mod grafana;
pub mod ini;
pub mod model;

#[cfg(test)]
mod grafana_test;
#[cfg(test)]
mod model_test;

use crds::Grafana;
use tracing::warn;

use crate::cluster::actions::Action;
use crate::cluster::state::ClusterState;
use crate::config::ConfigStore;
use ini::render_grafana_ini;
use model::config_map::{dashboards_config_action, grafana_config_action};
use model::deployment::deployment_action;
use model::ingress::ingress_action;
use model::service::service_action;
use model::service_account::service_account_action;

/// Ordered actions for one pass plus the hash of the rendered grafana.ini
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredClusterState {
    pub actions: Vec<Action>,
    /// `None` when grafana.ini could not be rendered this pass
    pub config_hash: Option<String>,
}

/// Computes the actions that bring the cluster to the state a Grafana describes
pub struct GrafanaReconciler<'a> {
    config: &'a ConfigStore,
    ini_template: Option<&'a str>,
}

impl<'a> GrafanaReconciler<'a> {
    pub fn new(config: &'a ConfigStore, ini_template: Option<&'a str>) -> Self {
        Self { config, ini_template }
    }

    /// One action per managed object, in dependency order:
    /// Service, ServiceAccount, grafana.ini, dashboards, Deployment, Ingress.
    ///
    /// A grafana.ini that fails to render skips only its own action; the Deployment
    /// then keeps the last known config hash.
    pub fn reconcile(&self, grafana: &Grafana, state: &ClusterState) -> DesiredClusterState {
        let mut actions = Vec::with_capacity(6);

        actions.push(service_action(grafana, state.service.as_ref(), self.config));
        actions.push(service_account_action(grafana, state.service_account.as_ref()));

        let config_hash = match render_grafana_ini(grafana, self.ini_template) {
            Ok(rendered) => {
                actions.push(grafana_config_action(grafana, state.config.as_ref(), &rendered));
                Some(rendered.hash)
            }
            Err(e) => {
                warn!("Skipping grafana.ini update: {}", e);
                None
            }
        };

        actions.push(dashboards_config_action(grafana, state.dashboards_config.as_ref()));

        let deployment_hash = config_hash
            .clone()
            .or_else(|| grafana.status.as_ref().and_then(|s| s.last_config.clone()));
        actions.push(deployment_action(
            grafana,
            state.deployment.as_ref(),
            self.config,
            deployment_hash.as_deref(),
        ));

        if let Some(action) = ingress_action(grafana, state.ingress.as_ref()) {
            actions.push(action);
        }

        DesiredClusterState { actions, config_hash }
    }
}
