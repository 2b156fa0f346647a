//! Shared configuration store.
//!
//! Both controllers run in the same process and coordinate through one [`ConfigStore`]:
//! the Grafana controller publishes the operator namespace, the dashboard selectors and
//! the installed plugin set; the dashboard controller publishes per-dashboard plugin
//! requests. Every accessor takes the lock for the duration of a single call only.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use crds::{DashboardLabelSelector, PluginList};

use crate::constants::{
    GRAFANA_IMAGE, GRAFANA_VERSION, PLUGINS_INIT_CONTAINER_IMAGE, PLUGINS_INIT_CONTAINER_TAG,
    POD_LABEL_DEFAULT_VALUE,
};

/// Scalar configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    /// Namespace of the Grafana instance; dashboards are imported there
    OperatorNamespace,
    GrafanaImage,
    GrafanaImageTag,
    PluginsInitImage,
    PluginsInitImageTag,
    /// Value of the `app` label on Grafana pods
    PodLabelValue,
}

impl Setting {
    /// Value used when nothing was stored
    pub fn default_value(self) -> Option<&'static str> {
        match self {
            Setting::OperatorNamespace => None,
            Setting::GrafanaImage => Some(GRAFANA_IMAGE),
            Setting::GrafanaImageTag => Some(GRAFANA_VERSION),
            Setting::PluginsInitImage => Some(PLUGINS_INIT_CONTAINER_IMAGE),
            Setting::PluginsInitImageTag => Some(PLUGINS_INIT_CONTAINER_TAG),
            Setting::PodLabelValue => Some(POD_LABEL_DEFAULT_VALUE),
        }
    }
}

#[derive(Debug, Default)]
struct ConfigState {
    values: HashMap<Setting, String>,
    dashboard_selectors: Option<Vec<DashboardLabelSelector>>,
    /// Last time any dashboard's plugin request changed
    plugins_updated: Option<DateTime<Utc>>,
    /// Plugin requests keyed by origin (dashboard id)
    plugins: BTreeMap<String, PluginList>,
    installed_plugins: PluginList,
    failed_plugins: PluginList,
}

/// Process-wide configuration shared by the controllers
#[derive(Debug, Default)]
pub struct ConfigStore {
    state: Mutex<ConfigState>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ConfigState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a value. Empty values are ignored so a blank env var keeps the default.
    pub fn set(&self, setting: Setting, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.lock().values.insert(setting, value);
    }

    pub fn remove(&self, setting: Setting) {
        self.lock().values.remove(&setting);
    }

    /// Stored value, without defaults
    pub fn get(&self, setting: Setting) -> Option<String> {
        self.lock().values.get(&setting).cloned()
    }

    /// Stored value, falling back to the setting's default (or empty)
    pub fn get_or_default(&self, setting: Setting) -> String {
        self.get(setting)
            .or_else(|| setting.default_value().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn operator_namespace(&self) -> Option<String> {
        self.get(Setting::OperatorNamespace)
    }

    pub fn set_dashboard_selectors(&self, selectors: Vec<DashboardLabelSelector>) {
        self.lock().dashboard_selectors = Some(selectors);
    }

    /// Forgets the selectors; dashboards wait until a Grafana object publishes new ones
    pub fn clear_dashboard_selectors(&self) {
        self.lock().dashboard_selectors = None;
    }

    pub fn dashboard_selectors(&self) -> Option<Vec<DashboardLabelSelector>> {
        self.lock().dashboard_selectors.clone()
    }

    /// Plugin request registered for `origin`
    pub fn plugins_for(&self, origin: &str) -> Option<PluginList> {
        self.lock().plugins.get(origin).cloned()
    }

    /// Records the plugin request of `origin`. Returns whether anything changed.
    ///
    /// An empty request removes the origin's entry.
    pub fn set_plugins_for(&self, origin: &str, plugins: PluginList) -> bool {
        let mut state = self.lock();
        let changed = if plugins.is_empty() {
            state.plugins.remove(origin).is_some()
        } else if state.plugins.get(origin) == Some(&plugins) {
            false
        } else {
            state.plugins.insert(origin.to_string(), plugins);
            true
        };
        if changed {
            state.plugins_updated = Some(Utc::now());
        }
        changed
    }

    /// Drops the plugin request of `origin`. Returns whether it was registered.
    pub fn remove_plugins_for(&self, origin: &str) -> bool {
        let mut state = self.lock();
        let removed = state.plugins.remove(origin).is_some();
        if removed {
            state.plugins_updated = Some(Utc::now());
        }
        removed
    }

    /// Copy of every registered request, keyed by origin
    pub fn plugin_registry(&self) -> BTreeMap<String, PluginList> {
        self.lock().plugins.clone()
    }

    /// All registered requests in origin order
    pub fn requested_plugins(&self) -> PluginList {
        self.lock()
            .plugins
            .values()
            .flat_map(|list| list.iter().cloned())
            .collect()
    }

    /// Number of dashboards with a registered plugin request
    pub fn registered_origins(&self) -> usize {
        self.lock().plugins.len()
    }

    pub fn plugins_updated(&self) -> Option<DateTime<Utc>> {
        self.lock().plugins_updated
    }

    /// Moves the last plugin update into the past
    #[cfg(test)]
    pub fn backdate_plugins_updated(&self, by: chrono::Duration) {
        let mut state = self.lock();
        state.plugins_updated = state.plugins_updated.map(|t| t - by);
    }

    /// Publishes what the Grafana controller installed and what it rejected
    pub fn set_plugin_state(&self, installed: PluginList, failed: PluginList) {
        let mut state = self.lock();
        state.installed_plugins = installed;
        state.failed_plugins = failed;
    }

    /// Installed and failed plugins as last published
    pub fn plugin_state(&self) -> (PluginList, PluginList) {
        let state = self.lock();
        (state.installed_plugins.clone(), state.failed_plugins.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::GrafanaPlugin;

    fn request(origin: &str, name: &str, version: &str) -> PluginList {
        vec![GrafanaPlugin::new(name, version).with_origin(origin)].into()
    }

    #[test]
    fn test_get_or_default() {
        let store = ConfigStore::new();
        assert_eq!(store.get_or_default(Setting::GrafanaImage), GRAFANA_IMAGE);
        assert_eq!(store.get_or_default(Setting::OperatorNamespace), "");

        store.set(Setting::GrafanaImage, "registry.local/grafana");
        assert_eq!(store.get_or_default(Setting::GrafanaImage), "registry.local/grafana");

        store.set(Setting::GrafanaImage, "");
        assert_eq!(store.get(Setting::GrafanaImage).as_deref(), Some("registry.local/grafana"));

        store.remove(Setting::GrafanaImage);
        assert_eq!(store.get(Setting::GrafanaImage), None);
    }

    #[test]
    fn test_selectors_lifecycle() {
        let store = ConfigStore::new();
        assert!(store.dashboard_selectors().is_none());

        store.set_dashboard_selectors(vec![DashboardLabelSelector::with_labels([("app", "grafana")])]);
        assert_eq!(store.dashboard_selectors().map(|s| s.len()), Some(1));

        store.clear_dashboard_selectors();
        assert!(store.dashboard_selectors().is_none());
    }

    #[test]
    fn test_set_plugins_for_tracks_changes() {
        let store = ConfigStore::new();
        assert!(store.plugins_updated().is_none());

        assert!(store.set_plugins_for("ns/a", request("ns/a", "clock", "1.0.0")));
        let first_update = store.plugins_updated();
        assert!(first_update.is_some());

        // Same request again is not a change
        assert!(!store.set_plugins_for("ns/a", request("ns/a", "clock", "1.0.0")));
        assert_eq!(store.plugins_updated(), first_update);

        assert!(store.set_plugins_for("ns/b", request("ns/b", "pie", "2.0.0")));
        assert_eq!(store.registered_origins(), 2);
        assert_eq!(store.requested_plugins().to_env(), "clock:1.0.0,pie:2.0.0");

        // Empty request unregisters the origin
        assert!(store.set_plugins_for("ns/b", PluginList::new()));
        assert!(store.plugins_for("ns/b").is_none());
        assert!(!store.set_plugins_for("ns/b", PluginList::new()));
    }

    #[test]
    fn test_remove_plugins_for_is_idempotent() {
        let store = ConfigStore::new();
        store.set_plugins_for("ns/a", request("ns/a", "clock", "1.0.0"));
        assert!(store.remove_plugins_for("ns/a"));
        assert!(!store.remove_plugins_for("ns/a"));
        assert!(store.plugin_registry().is_empty());
    }

    #[test]
    fn test_plugin_state_round_trip() {
        let store = ConfigStore::new();
        let installed = request("ns/a", "clock", "1.0.0");
        let failed = request("ns/b", "missing", "0.1.0");
        store.set_plugin_state(installed.clone(), failed.clone());
        assert_eq!(store.plugin_state(), (installed, failed));
    }
}
