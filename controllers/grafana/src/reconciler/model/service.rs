//! Grafana Service

use crds::Grafana;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{carry_metadata, managed_meta, normalize_service_type, pod_labels};
use crate::cluster::ManagedObject;
use crate::cluster::actions::Action;
use crate::config::ConfigStore;
use crate::constants::{GRAFANA_HTTP_PORT, GRAFANA_HTTP_PORT_NAME, GRAFANA_SERVICE_NAME};

pub fn service(grafana: &Grafana, config: &ConfigStore) -> Service {
    let spec = &grafana.spec.service;
    Service {
        metadata: managed_meta(
            grafana,
            GRAFANA_SERVICE_NAME,
            spec.labels.clone(),
            spec.annotations.clone(),
        ),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(GRAFANA_HTTP_PORT_NAME.to_string()),
                protocol: Some("TCP".to_string()),
                port: GRAFANA_HTTP_PORT,
                target_port: Some(IntOrString::String(GRAFANA_HTTP_PORT_NAME.to_string())),
                ..Default::default()
            }]),
            selector: Some(pod_labels(config)),
            type_: Some(normalize_service_type(spec.service_type.as_deref())),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Keeps the cluster-assigned addresses and node ports of `old`
pub fn merge_service(old: &Service, mut new: Service) -> Service {
    carry_metadata(&old.metadata, &mut new.metadata);
    let (Some(old_spec), Some(new_spec)) = (old.spec.as_ref(), new.spec.as_mut()) else {
        return new;
    };
    new_spec.cluster_ip = old_spec.cluster_ip.clone();
    new_spec.cluster_ips = old_spec.cluster_ips.clone();

    let old_ports = old_spec.ports.as_deref().unwrap_or_default();
    for port in new_spec.ports.iter_mut().flatten() {
        if port.node_port.is_none() {
            port.node_port = old_ports
                .iter()
                .find(|p| p.port == port.port)
                .and_then(|p| p.node_port);
        }
    }
    new
}

pub fn service_action(grafana: &Grafana, current: Option<&Service>, config: &ConfigStore) -> Action {
    let desired = service(grafana, config);
    match current {
        None => Action::create(ManagedObject::Service(desired), "create grafana service"),
        Some(old) => Action::update(
            ManagedObject::Service(merge_service(old, desired)),
            "update grafana service",
        ),
    }
}
