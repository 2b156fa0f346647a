//! Grafana Deployment
//!
//! One Grafana container plus an init container that downloads the installed plugins
//! (passed as `name:version,...` in its environment) into a shared volume.

use std::collections::BTreeMap;

use crds::Grafana;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, PodSpec,
    PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use super::{carry_metadata, image_setting, managed_meta, pod_labels};
use crate::cluster::ManagedObject;
use crate::cluster::actions::Action;
use crate::config::{ConfigStore, Setting};
use crate::constants::{
    CONFIG_HASH_ANNOTATION, GRAFANA_CONFIG_FILE_NAME, GRAFANA_CONFIG_MAP_NAME, GRAFANA_CONFIG_PATH,
    GRAFANA_CONTAINER_NAME, GRAFANA_DASHBOARDS_CONFIG_MAP_NAME, GRAFANA_DASHBOARDS_PATH,
    GRAFANA_DATA_PATH, GRAFANA_DEPLOYMENT_NAME, GRAFANA_HTTP_PORT, GRAFANA_HTTP_PORT_NAME,
    GRAFANA_LOGS_PATH, GRAFANA_PLUGINS_INIT_CONTAINER_NAME, GRAFANA_PLUGINS_PATH,
    GRAFANA_SERVICE_ACCOUNT_NAME, PLUGINS_ENV_VAR,
};

const CONFIG_VOLUME: &str = "grafana-config";
const DASHBOARDS_VOLUME: &str = "grafana-dashboards";
const PLUGINS_VOLUME: &str = "grafana-plugins";
const DATA_VOLUME: &str = "grafana-data";
const LOGS_VOLUME: &str = "grafana-logs";

fn mount(name: &str, path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: read_only.then_some(true),
        ..Default::default()
    }
}

fn config_map_volume(name: &str, config_map: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

/// Desired Deployment. `config_hash` lands on the pod template so a new grafana.ini rolls the pods.
pub fn deployment(grafana: &Grafana, config: &ConfigStore, config_hash: Option<&str>) -> Deployment {
    let spec = &grafana.spec;
    let labels = pod_labels(config);
    let installed = grafana
        .status
        .as_ref()
        .map(|s| s.installed_plugins.to_env())
        .unwrap_or_default();

    let grafana_image = format!(
        "{}:{}",
        image_setting(config, spec.base_image.as_deref(), Setting::GrafanaImage),
        image_setting(config, spec.base_image_tag.as_deref(), Setting::GrafanaImageTag)
    );
    let init_image = format!(
        "{}:{}",
        image_setting(config, spec.init_image.as_deref(), Setting::PluginsInitImage),
        image_setting(config, spec.init_image_tag.as_deref(), Setting::PluginsInitImageTag)
    );

    let pod_annotations = config_hash
        .map(|hash| BTreeMap::from([(CONFIG_HASH_ANNOTATION.to_string(), hash.to_string())]));

    Deployment {
        metadata: managed_meta(grafana, GRAFANA_DEPLOYMENT_NAME, Some(labels.clone()), None),
        spec: Some(DeploymentSpec {
            replicas: Some(spec.initial_replicas.unwrap_or(1).max(1)),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(GRAFANA_DEPLOYMENT_NAME.to_string()),
                    labels: Some(labels),
                    annotations: pod_annotations,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(GRAFANA_SERVICE_ACCOUNT_NAME.to_string()),
                    init_containers: Some(vec![Container {
                        name: GRAFANA_PLUGINS_INIT_CONTAINER_NAME.to_string(),
                        image: Some(init_image),
                        env: Some(vec![EnvVar {
                            name: PLUGINS_ENV_VAR.to_string(),
                            value: Some(installed),
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![mount(PLUGINS_VOLUME, "/opt/plugins", false)]),
                        ..Default::default()
                    }]),
                    containers: vec![Container {
                        name: GRAFANA_CONTAINER_NAME.to_string(),
                        image: Some(grafana_image),
                        args: Some(vec![format!(
                            "-config={}/{}",
                            GRAFANA_CONFIG_PATH, GRAFANA_CONFIG_FILE_NAME
                        )]),
                        ports: Some(vec![ContainerPort {
                            name: Some(GRAFANA_HTTP_PORT_NAME.to_string()),
                            container_port: GRAFANA_HTTP_PORT,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![
                            mount(CONFIG_VOLUME, GRAFANA_CONFIG_PATH, true),
                            mount(DASHBOARDS_VOLUME, GRAFANA_DASHBOARDS_PATH, true),
                            mount(PLUGINS_VOLUME, GRAFANA_PLUGINS_PATH, false),
                            mount(DATA_VOLUME, GRAFANA_DATA_PATH, false),
                            mount(LOGS_VOLUME, GRAFANA_LOGS_PATH, false),
                        ]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![
                        config_map_volume(CONFIG_VOLUME, GRAFANA_CONFIG_MAP_NAME),
                        config_map_volume(DASHBOARDS_VOLUME, GRAFANA_DASHBOARDS_CONFIG_MAP_NAME),
                        empty_dir_volume(PLUGINS_VOLUME),
                        empty_dir_volume(DATA_VOLUME),
                        empty_dir_volume(LOGS_VOLUME),
                    ]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Keeps the replica count of a running Deployment; `initialReplicas` only applies on create
pub fn merge_deployment(old: &Deployment, mut new: Deployment) -> Deployment {
    carry_metadata(&old.metadata, &mut new.metadata);
    if let (Some(old_spec), Some(new_spec)) = (old.spec.as_ref(), new.spec.as_mut()) {
        new_spec.replicas = old_spec.replicas.or(new_spec.replicas);
    }
    new
}

pub fn deployment_action(
    grafana: &Grafana,
    current: Option<&Deployment>,
    config: &ConfigStore,
    config_hash: Option<&str>,
) -> Action {
    let desired = deployment(grafana, config, config_hash);
    match current {
        None => Action::create(ManagedObject::Deployment(desired), "create grafana deployment"),
        Some(old) => Action::update(
            ManagedObject::Deployment(merge_deployment(old, desired)),
            "update grafana deployment",
        ),
    }
}

/// Plugin environment value of the init container, if present
pub fn plugins_env(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .init_containers
        .as_ref()?
        .iter()
        .find(|c| c.name == GRAFANA_PLUGINS_INIT_CONTAINER_NAME)?
        .env
        .as_ref()?
        .iter()
        .find(|e| e.name == PLUGINS_ENV_VAR)?
        .value
        .as_deref()
}
