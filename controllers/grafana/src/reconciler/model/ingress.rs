//! Grafana Ingress, only managed while `spec.ingress.enabled` is set

use crds::Grafana;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};

use super::{carry_metadata, managed_meta};
use crate::cluster::ManagedObject;
use crate::cluster::actions::Action;
use crate::constants::{GRAFANA_HTTP_PORT, GRAFANA_INGRESS_NAME, GRAFANA_SERVICE_NAME};

pub fn ingress(grafana: &Grafana) -> Ingress {
    let spec = &grafana.spec.ingress;
    let host = spec.hostname.clone().filter(|h| !h.trim().is_empty());
    let path = spec
        .path
        .clone()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "/".to_string());

    let tls = spec.tls_enabled.then(|| {
        vec![IngressTLS {
            hosts: host.clone().map(|h| vec![h]),
            secret_name: spec.tls_secret_name.clone(),
        }]
    });

    Ingress {
        metadata: managed_meta(
            grafana,
            GRAFANA_INGRESS_NAME,
            spec.labels.clone(),
            spec.annotations.clone(),
        ),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host,
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(path),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: GRAFANA_SERVICE_NAME.to_string(),
                                port: Some(ServiceBackendPort {
                                    number: Some(GRAFANA_HTTP_PORT),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            tls,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn merge_ingress(old: &Ingress, mut new: Ingress) -> Ingress {
    carry_metadata(&old.metadata, &mut new.metadata);
    new
}

/// `None` while the ingress is disabled
pub fn ingress_action(grafana: &Grafana, current: Option<&Ingress>) -> Option<Action> {
    if !grafana.spec.ingress.enabled {
        return None;
    }
    let desired = ingress(grafana);
    Some(match current {
        None => Action::create(ManagedObject::Ingress(desired), "create grafana ingress"),
        Some(old) => Action::update(
            ManagedObject::Ingress(merge_ingress(old, desired)),
            "update grafana ingress",
        ),
    })
}
