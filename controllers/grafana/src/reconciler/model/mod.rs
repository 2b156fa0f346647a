//! Desired objects for a Grafana and the merge rules that carry server-assigned
//! fields forward when an object already exists.

pub mod config_map;
pub mod deployment;
pub mod ingress;
pub mod service;
pub mod service_account;

use std::collections::BTreeMap;

use crds::Grafana;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::config::{ConfigStore, Setting};
use crate::constants::{DEFAULT_LOG_LEVEL, DEFAULT_SERVICE_TYPE};

const LOG_LEVELS: [&str; 5] = ["debug", "info", "warn", "error", "critical"];
const SERVICE_TYPES: [&str; 3] = ["ClusterIP", "NodePort", "LoadBalancer"];

/// Lower-cased log level, or the default for unknown values
pub fn normalize_log_level(raw: Option<&str>) -> String {
    let level = raw.unwrap_or_default().trim().to_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        level
    } else {
        DEFAULT_LOG_LEVEL.to_string()
    }
}

/// Supported service type, or ClusterIP
pub fn normalize_service_type(raw: Option<&str>) -> String {
    let service_type = raw.unwrap_or_default().trim();
    if SERVICE_TYPES.contains(&service_type) {
        service_type.to_string()
    } else {
        DEFAULT_SERVICE_TYPE.to_string()
    }
}

/// `app=<pod label>` selecting the Grafana pods
pub fn pod_labels(config: &ConfigStore) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), config.get_or_default(Setting::PodLabelValue))])
}

/// Metadata of a managed object living next to `grafana`
pub fn managed_meta(
    grafana: &Grafana,
    name: &str,
    labels: Option<BTreeMap<String, String>>,
    annotations: Option<BTreeMap<String, String>>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: grafana.namespace(),
        labels,
        annotations,
        ..Default::default()
    }
}

/// Carries the resourceVersion (the update precondition) and foreign owner references
pub fn carry_metadata(old: &ObjectMeta, new: &mut ObjectMeta) {
    new.resource_version = old.resource_version.clone();
    if new.owner_references.is_none() {
        new.owner_references = old.owner_references.clone();
    }
}

/// Value of a spec override, falling back to the shared setting
pub(crate) fn image_setting(config: &ConfigStore, spec_value: Option<&str>, setting: Setting) -> String {
    spec_value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| config.get_or_default(setting), str::to_string)
}
