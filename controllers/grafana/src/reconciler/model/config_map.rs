//! grafana.ini ConfigMap and the dashboards ConfigMap

use std::collections::BTreeMap;

use crds::Grafana;
use k8s_openapi::api::core::v1::ConfigMap;

use super::{carry_metadata, managed_meta};
use crate::cluster::ManagedObject;
use crate::cluster::actions::Action;
use crate::constants::{
    GRAFANA_CONFIG_FILE_NAME, GRAFANA_CONFIG_MAP_NAME, GRAFANA_DASHBOARDS_CONFIG_MAP_NAME,
};
use crate::reconciler::ini::RenderedConfig;

pub fn grafana_config(grafana: &Grafana, rendered: &RenderedConfig) -> ConfigMap {
    ConfigMap {
        metadata: managed_meta(grafana, GRAFANA_CONFIG_MAP_NAME, None, None),
        data: Some(BTreeMap::from([(
            GRAFANA_CONFIG_FILE_NAME.to_string(),
            rendered.contents.clone(),
        )])),
        ..Default::default()
    }
}

pub fn merge_grafana_config(old: &ConfigMap, mut new: ConfigMap) -> ConfigMap {
    carry_metadata(&old.metadata, &mut new.metadata);
    new
}

pub fn grafana_config_action(grafana: &Grafana, current: Option<&ConfigMap>, rendered: &RenderedConfig) -> Action {
    let desired = grafana_config(grafana, rendered);
    match current {
        None => Action::create(ManagedObject::ConfigMap(desired), "create grafana config"),
        Some(old) => Action::update(
            ManagedObject::ConfigMap(merge_grafana_config(old, desired)),
            "update grafana config",
        ),
    }
}

/// Empty dashboards ConfigMap; dashboards are written into it by the dashboard controller
pub fn dashboards_config(grafana: &Grafana) -> ConfigMap {
    ConfigMap {
        metadata: managed_meta(grafana, GRAFANA_DASHBOARDS_CONFIG_MAP_NAME, None, None),
        ..Default::default()
    }
}

/// Keeps every imported dashboard
pub fn merge_dashboards_config(old: &ConfigMap, mut new: ConfigMap) -> ConfigMap {
    carry_metadata(&old.metadata, &mut new.metadata);
    new.data = old.data.clone();
    new.binary_data = old.binary_data.clone();
    new
}

pub fn dashboards_config_action(grafana: &Grafana, current: Option<&ConfigMap>) -> Action {
    let desired = dashboards_config(grafana);
    match current {
        None => Action::create(ManagedObject::ConfigMap(desired), "create grafana dashboards config"),
        Some(old) => Action::update(
            ManagedObject::ConfigMap(merge_dashboards_config(old, desired)),
            "update grafana dashboards config",
        ),
    }
}
