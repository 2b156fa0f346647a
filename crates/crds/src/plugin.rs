//! Grafana plugin requests
//!
//! A plugin is identified by its name and version. Dashboards request plugins and the
//! operator records which dashboard (the origin) asked for each one.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

use schemars::JsonSchema;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version string that cannot be read as a semantic version
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid plugin version '{0}'")]
pub struct InvalidVersion(pub String);

/// A plugin release, optionally attributed to the dashboard requesting it
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaPlugin {
    /// Plugin identifier, e.g. "grafana-piechart-panel"
    pub name: String,

    /// Plugin version, e.g. "1.3.6"
    pub version: String,

    /// Dashboard (`<namespace>/<name>`) that requested this plugin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl GrafanaPlugin {
    /// Release without an origin
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            origin: None,
        }
    }

    /// Same plugin, attributed to `origin`
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Parsed version, see [`parse_version`]
    pub fn parsed_version(&self) -> Result<Version, InvalidVersion> {
        parse_version(&self.version)
    }

    /// Same name and version, origin ignored
    pub fn same_release(&self, other: &GrafanaPlugin) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl fmt::Display for GrafanaPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Parses a plugin version leniently.
///
/// Plugin authors publish versions such as `v1.2`, `5` or `1.0.0-beta1`. A leading `v`
/// is stripped and missing minor/patch components are filled with zero.
pub fn parse_version(raw: &str) -> Result<Version, InvalidVersion> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(stripped) {
        return Ok(version);
    }

    let (core, suffix) = match stripped.find(['-', '+']) {
        Some(index) => stripped.split_at(index),
        None => (stripped, ""),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(InvalidVersion(raw.to_string()));
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&format!("{}{}", parts.join("."), suffix))
        .map_err(|_| InvalidVersion(raw.to_string()))
}

/// Compares two plugin versions
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, InvalidVersion> {
    Ok(parse_version(a)?.cmp(&parse_version(b)?))
}

/// Ordered list of plugins
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct PluginList(Vec<GrafanaPlugin>);

impl PluginList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every plugin of `plugins` with `origin`
    pub fn requested_by(plugins: &[GrafanaPlugin], origin: &str) -> Self {
        Self(
            plugins
                .iter()
                .cloned()
                .map(|plugin| plugin.with_origin(origin))
                .collect(),
        )
    }

    /// Appends a plugin
    pub fn push(&mut self, plugin: GrafanaPlugin) {
        self.0.push(plugin);
    }

    /// The plugins as a vector
    pub fn into_inner(self) -> Vec<GrafanaPlugin> {
        self.0
    }

    /// Any version of the named plugin is present
    pub fn has_some_version_of(&self, plugin: &GrafanaPlugin) -> bool {
        self.0.iter().any(|p| p.name == plugin.name)
    }

    /// The exact name and version is present
    pub fn has_exact_version_of(&self, plugin: &GrafanaPlugin) -> bool {
        self.0.iter().any(|p| p.same_release(plugin))
    }

    /// First entry sharing the plugin's name
    pub fn installed_version_of(&self, plugin: &GrafanaPlugin) -> Option<&GrafanaPlugin> {
        self.0.iter().find(|p| p.name == plugin.name)
    }

    /// Number of entries sharing the plugin's name
    pub fn versions_of(&self, plugin: &GrafanaPlugin) -> usize {
        self.0.iter().filter(|p| p.name == plugin.name).count()
    }

    /// Keeps only entries matching `predicate`
    pub fn retain(&mut self, predicate: impl FnMut(&GrafanaPlugin) -> bool) {
        self.0.retain(predicate);
    }

    /// Drops exact duplicates (name and version), keeping the first occurrence
    pub fn dedup_releases(&mut self) {
        let mut seen: Vec<(String, String)> = Vec::new();
        self.0.retain(|p| {
            let key = (p.name.clone(), p.version.clone());
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
    }

    /// Keeps only the highest version of each plugin name.
    ///
    /// Names are kept in first-seen order. When any version of a name cannot be parsed,
    /// the first-seen entry for that name wins and the result is flagged as degraded.
    pub fn collapse_latest(&self) -> (PluginList, bool) {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&GrafanaPlugin>> = HashMap::new();
        for plugin in &self.0 {
            let group = groups.entry(plugin.name.as_str()).or_default();
            if group.is_empty() {
                order.push(plugin.name.as_str());
            }
            group.push(plugin);
        }

        let mut degraded = false;
        let mut collapsed = PluginList::new();
        for name in order {
            let Some(group) = groups.get(name) else {
                continue;
            };
            let Some(first) = group.first() else {
                continue;
            };
            let parsed: Result<Vec<Version>, InvalidVersion> =
                group.iter().map(|p| p.parsed_version()).collect();
            match parsed {
                Ok(versions) => {
                    let mut best = 0;
                    for (index, version) in versions.iter().enumerate() {
                        if version > &versions[best] {
                            best = index;
                        }
                    }
                    collapsed.push(group[best].clone());
                }
                Err(_) => {
                    degraded = true;
                    collapsed.push((*first).clone());
                }
            }
        }
        (collapsed, degraded)
    }

    /// Value of the init container's plugin environment variable: `name:version,...`
    pub fn to_env(&self) -> String {
        self.0
            .iter()
            .map(|p| format!("{}:{}", p.name, p.version))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Deref for PluginList {
    type Target = [GrafanaPlugin];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<GrafanaPlugin>> for PluginList {
    fn from(plugins: Vec<GrafanaPlugin>) -> Self {
        Self(plugins)
    }
}

impl FromIterator<GrafanaPlugin> for PluginList {
    fn from_iter<I: IntoIterator<Item = GrafanaPlugin>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PluginList {
    type Item = &'a GrafanaPlugin;
    type IntoIter = std::slice::Iter<'a, GrafanaPlugin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
