//! GrafanaDashboard CRD
//!
//! A dashboard definition (inline JSON and/or a remote URL) plus the plugins it needs.
//! Dashboards are imported into the Grafana instance whose selectors match their labels.

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plugin::{GrafanaPlugin, PluginList};
use crate::selector::{DashboardLabelSelector, SelectorError, matches_any};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "integreatly.org",
    version = "v1alpha1",
    kind = "GrafanaDashboard",
    namespaced,
    status = "GrafanaDashboardStatus"
)]
#[serde(rename_all = "camelCase")]
/// Desired dashboard
pub struct GrafanaDashboardSpec {
    /// Dashboard name, unique within the namespace. Used verbatim in the dashboards
    /// ConfigMap key, so only `[A-Za-z0-9._-]` is accepted.
    #[schemars(regex(pattern = r"^[A-Za-z0-9._-]+$"))]
    pub name: String,

    /// Inline dashboard JSON
    #[serde(default)]
    pub json: String,

    /// Remote location of the dashboard JSON, preferred over `json` when reachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Plugins this dashboard needs
    #[serde(default)]
    pub plugins: Vec<GrafanaPlugin>,
}

/// Observed state of a dashboard
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDashboardStatus {
    /// Lifecycle phase
    #[serde(default)]
    pub phase: DashboardPhase,

    /// Hash of the last imported (or rejected) content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_config: Option<String>,

    /// Hash of content that failed validation; not retried until the content changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_config: Option<String>,

    /// Plugins resolved for this dashboard
    #[serde(default)]
    pub installed_plugins: PluginList,

    /// Requested plugins the registry does not know about
    #[serde(default)]
    pub failed_plugins: PluginList,

    /// Human readable history, oldest first
    #[serde(default)]
    pub messages: Vec<StatusMessage>,
}

/// One line of dashboard history
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    /// What happened
    pub message: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

/// Dashboard lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum DashboardPhase {
    /// Never reconciled
    #[default]
    #[serde(alias = "uninitialized")]
    Uninitialized,

    /// Waiting for the cleanup finalizer to be registered
    #[serde(alias = "finalizerPending")]
    FinalizerPending,

    /// Finalizer registered; content is imported on every pass
    #[serde(alias = "created")]
    Created,
}

impl GrafanaDashboard {
    /// Identifier used as the plugin origin: `<namespace>/<spec.name>`
    pub fn dashboard_id(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.spec.name)
    }

    /// True when ANY selector matches this dashboard's labels
    pub fn matches_selectors(&self, selectors: &[DashboardLabelSelector]) -> Result<bool, SelectorError> {
        matches_any(selectors, self.labels())
    }

    /// Plugins requested in the spec, tagged with this dashboard as origin
    pub fn requested_plugins(&self) -> PluginList {
        PluginList::requested_by(&self.spec.plugins, &self.dashboard_id())
    }

    /// `spec.name` is non-empty and limited to `[A-Za-z0-9._-]`
    pub fn has_valid_name(&self) -> bool {
        !self.spec.name.is_empty()
            && self
                .spec
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    /// `finalizer` is registered on the object
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Current phase, `Uninitialized` without a status
    pub fn phase(&self) -> DashboardPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }
}

impl GrafanaDashboardStatus {
    /// Appends a message unless it repeats the most recent one. Returns whether it was added.
    pub fn append_message(&mut self, message: impl Into<String>, timestamp: DateTime<Utc>) -> bool {
        let message = message.into();
        if self.messages.last().is_some_and(|last| last.message == message) {
            return false;
        }
        self.messages.push(StatusMessage { message, timestamp });
        true
    }
}
