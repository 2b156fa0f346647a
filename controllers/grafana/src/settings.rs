//! Operator settings read from the environment at startup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use grafana_client::DEFAULT_PLUGINS_URL;
use tracing::{debug, info};

use crate::config::{ConfigStore, Setting};
use crate::constants::{DEFAULT_METRICS_ADDR, DEFAULT_TEMPLATE_PATH, GRAFANA_CONFIG_FILE_NAME};
use crate::error::ControllerError;

/// Environment variables that override [`Setting`] defaults
const SETTING_VARS: [(&str, Setting); 5] = [
    ("GRAFANA_IMAGE_URL", Setting::GrafanaImage),
    ("GRAFANA_IMAGE_TAG", Setting::GrafanaImageTag),
    ("GRAFANA_PLUGINS_INIT_CONTAINER_IMAGE_URL", Setting::PluginsInitImage),
    ("GRAFANA_PLUGINS_INIT_CONTAINER_IMAGE_TAG", Setting::PluginsInitImageTag),
    ("GRAFANA_POD_LABEL", Setting::PodLabelValue),
];

#[derive(Debug, Clone)]
pub struct OperatorSettings {
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Directory holding an optional `grafana.ini` base template
    pub template_path: PathBuf,
    /// Plugin registry URL template
    pub plugins_url: String,
    pub metrics_addr: SocketAddr,
    overrides: Vec<(Setting, String)>,
}

impl OperatorSettings {
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let metrics_raw = get("METRICS_BIND_ADDRESS").unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_raw.parse().map_err(|_| {
            ControllerError::InvalidConfig(format!(
                "METRICS_BIND_ADDRESS '{metrics_raw}' is not a socket address"
            ))
        })?;

        let plugins_url = get("GRAFANA_PLUGINS_URL").unwrap_or_else(|| DEFAULT_PLUGINS_URL.to_string());
        if !plugins_url.contains("{name}") || !plugins_url.contains("{version}") {
            return Err(ControllerError::InvalidConfig(format!(
                "GRAFANA_PLUGINS_URL '{plugins_url}' must contain {{name}} and {{version}}"
            )));
        }

        let overrides = SETTING_VARS
            .iter()
            .filter_map(|(key, setting)| get(key).map(|value| (*setting, value)))
            .collect();

        Ok(Self {
            watch_namespace: get("WATCH_NAMESPACE"),
            template_path: get("TEMPLATE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH), PathBuf::from),
            plugins_url,
            metrics_addr,
            overrides,
        })
    }

    /// Copies the image and label overrides into the shared store
    pub fn seed(&self, store: &ConfigStore) {
        for (setting, value) in &self.overrides {
            debug!("Config override {:?} = {}", setting, value);
            store.set(*setting, value.clone());
        }
    }

    /// Reads `<template_path>/grafana.ini` if it exists
    pub fn load_ini_template(&self) -> Result<Option<String>, ControllerError> {
        read_optional(&self.template_path.join(GRAFANA_CONFIG_FILE_NAME))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ControllerError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            info!("Loaded grafana.ini template from {}", path.display());
            Ok(Some(contents))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No grafana.ini template at {}, using built-in defaults", path.display());
            Ok(None)
        }
        Err(e) => Err(ControllerError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<OperatorSettings, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OperatorSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.watch_namespace, None);
        assert_eq!(s.template_path, PathBuf::from(DEFAULT_TEMPLATE_PATH));
        assert_eq!(s.plugins_url, DEFAULT_PLUGINS_URL);
        assert_eq!(s.metrics_addr.port(), 8080);
    }

    #[test]
    fn test_overrides_are_seeded() {
        let s = settings(&[
            ("WATCH_NAMESPACE", "monitoring"),
            ("GRAFANA_IMAGE_TAG", "7.0.0"),
            ("GRAFANA_POD_LABEL", "dashboards"),
            ("GRAFANA_IMAGE_URL", "  "),
        ])
        .unwrap();
        assert_eq!(s.watch_namespace.as_deref(), Some("monitoring"));

        let store = ConfigStore::new();
        s.seed(&store);
        assert_eq!(store.get_or_default(Setting::GrafanaImageTag), "7.0.0");
        assert_eq!(store.get_or_default(Setting::PodLabelValue), "dashboards");
        assert_eq!(store.get(Setting::GrafanaImage), None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            settings(&[("METRICS_BIND_ADDRESS", "localhost")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            settings(&[("GRAFANA_PLUGINS_URL", "https://plugins.local/all")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_template_is_not_an_error() {
        let s = settings(&[("TEMPLATE_PATH", "/nonexistent/templates")]).unwrap();
        assert_eq!(s.load_ini_template().unwrap(), None);
    }
}
