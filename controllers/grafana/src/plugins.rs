//! Plugin resolution.
//!
//! Turns a set of requested plugins into the set that should be installed, given what is
//! already installed, what failed before and how many dashboards ask for each plugin.
//! Upgrades are only accepted when a single dashboard asks for the plugin; otherwise the
//! installed version is kept and the conflict is reported.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use crds::{GrafanaPlugin, PluginList};

use crate::constants::PLUGINS_MIN_AGE;

/// Distinct dashboards requesting each plugin name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterIndex {
    by_name: BTreeMap<String, BTreeSet<String>>,
}

impl RequesterIndex {
    /// Index over every registered request
    pub fn from_registry(registry: &BTreeMap<String, PluginList>) -> Self {
        let mut index = Self::default();
        for (origin, plugins) in registry {
            index.add(origin, plugins);
        }
        index
    }

    fn add(&mut self, origin: &str, plugins: &PluginList) {
        for plugin in plugins {
            self.by_name
                .entry(plugin.name.clone())
                .or_default()
                .insert(origin.to_string());
        }
    }

    /// Replaces whatever `origin` had registered with `plugins`
    pub fn with_request(mut self, origin: &str, plugins: &PluginList) -> Self {
        for origins in self.by_name.values_mut() {
            origins.remove(origin);
        }
        self.by_name.retain(|_, origins| !origins.is_empty());
        self.add(origin, plugins);
        self
    }

    /// Number of origins requesting any version of `name`
    pub fn requesters_of(&self, name: &str) -> usize {
        self.by_name.get(name).map_or(0, BTreeSet::len)
    }
}

/// Something worth telling the requesting dashboard about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginNote {
    /// Dashboard the note is about, if any
    pub origin: Option<String>,
    pub message: String,
}

/// Result of one plugin resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Plugins that should be installed
    pub plugins: PluginList,
    /// Whether `plugins` differs from what was installed
    pub changed: bool,
    /// Messages for the requesting dashboards
    pub notes: Vec<PluginNote>,
    /// Some versions could not be compared; first-seen versions were used
    pub degraded: bool,
}

impl Resolution {
    fn note(&mut self, plugin: &GrafanaPlugin, message: String) {
        self.notes.push(PluginNote {
            origin: plugin.origin.clone(),
            message,
        });
    }
}

/// Resolves `requested` against the current plugin state.
///
/// * `previous` - what was resolved last time for the same requester(s); plugins missing
///   from `requested` are removals
/// * `installed` - what is installed right now
/// * `failed` - releases the registry does not know; never retried
pub fn resolve(
    requested: &PluginList,
    previous: &PluginList,
    installed: &PluginList,
    failed: &PluginList,
    requesters: &RequesterIndex,
) -> Resolution {
    let (requested, degraded) = requested.collapse_latest();
    let mut resolution = Resolution {
        degraded,
        ..Default::default()
    };
    if degraded {
        resolution.notes.push(PluginNote {
            origin: None,
            message: "unable to compare plugin versions, using the first requested version".to_string(),
        });
    }

    if requested.is_empty() {
        resolution.changed = !previous.is_empty();
        return resolution;
    }

    for plugin in &requested {
        if let Some(accepted) = resolution.plugins.installed_version_of(plugin) {
            if !accepted.same_release(plugin) {
                let message = format!(
                    "not installing version {} of {} because {} is already selected",
                    plugin.version, plugin.name, accepted.version
                );
                resolution.note(plugin, message);
            }
            continue;
        }

        if failed.has_exact_version_of(plugin) {
            continue;
        }

        if installed.has_exact_version_of(plugin) {
            resolution.plugins.push(plugin.clone());
            continue;
        }

        let Some(current) = installed.installed_version_of(plugin) else {
            resolution.note(plugin, format!("installing plugin {}", plugin));
            resolution.plugins.push(plugin.clone());
            resolution.changed = true;
            continue;
        };

        let requesters = requesters.requesters_of(&plugin.name);
        if requesters <= 1 {
            let message = format!(
                "changing version of plugin {} from {} to {}",
                plugin.name, current.version, plugin.version
            );
            resolution.note(plugin, message);
            resolution.plugins.push(plugin.clone());
            resolution.changed = true;
        } else {
            let message = format!(
                "not changing version of plugin {} to {}: version {} is requested by {} dashboards",
                plugin.name, plugin.version, current.version, requesters
            );
            resolution.note(plugin, message);
            // Deferred: the installed release stays in place
            resolution.plugins.push(current.clone());
        }
    }

    if previous.iter().any(|p| !requested.has_some_version_of(p)) {
        resolution.changed = true;
    }
    resolution
}

/// Plugin changes are applied only once requests have been quiet for [`PLUGINS_MIN_AGE`].
///
/// Nothing is applied before the first request was registered.
pub fn can_update_plugins(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let Some(last_update) = last_update else {
        return false;
    };
    (now - last_update)
        .to_std()
        .is_ok_and(|age| age >= PLUGINS_MIN_AGE)
}
