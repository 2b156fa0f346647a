//! Grafana ServiceAccount

use crds::Grafana;
use k8s_openapi::api::core::v1::ServiceAccount;

use super::{carry_metadata, managed_meta};
use crate::cluster::ManagedObject;
use crate::cluster::actions::Action;
use crate::constants::GRAFANA_SERVICE_ACCOUNT_NAME;

pub fn service_account(grafana: &Grafana) -> ServiceAccount {
    ServiceAccount {
        metadata: managed_meta(grafana, GRAFANA_SERVICE_ACCOUNT_NAME, None, None),
        ..Default::default()
    }
}

/// Keeps the token and pull secrets attached by the cluster
pub fn merge_service_account(old: &ServiceAccount, mut new: ServiceAccount) -> ServiceAccount {
    carry_metadata(&old.metadata, &mut new.metadata);
    new.secrets = old.secrets.clone();
    new.image_pull_secrets = old.image_pull_secrets.clone();
    new
}

pub fn service_account_action(grafana: &Grafana, current: Option<&ServiceAccount>) -> Action {
    let desired = service_account(grafana);
    match current {
        None => Action::create(
            ManagedObject::ServiceAccount(desired),
            "create grafana service account",
        ),
        Some(old) => Action::update(
            ManagedObject::ServiceAccount(merge_service_account(old, desired)),
            "update grafana service account",
        ),
    }
}
