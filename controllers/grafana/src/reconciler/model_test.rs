//! Unit tests for desired state and merge rules

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::cluster::ManagedObject;
    use crate::cluster::actions::{ActionKind, stamp_owner};
    use crate::cluster::state::ClusterState;
    use crate::config::{ConfigStore, Setting};
    use crate::constants::*;
    use crate::reconciler::GrafanaReconciler;
    use crate::reconciler::model::config_map::merge_dashboards_config;
    use crate::reconciler::model::deployment::{deployment, merge_deployment, plugins_env};
    use crate::reconciler::model::service::{merge_service, service};
    use crate::reconciler::model::service_account::{merge_service_account, service_account};
    use crate::test_utils::*;
    use crds::{Grafana, GrafanaPlugin, GrafanaStatus};
    use k8s_openapi::api::core::v1::{LocalObjectReference, ObjectReference};
    use kube::Resource;

    fn grafana() -> Grafana {
        create_test_grafana("grafana", "monitoring")
    }

    /// Cluster state after applying every action of `desired` on an empty cluster
    fn applied(grafana: &Grafana, config: &ConfigStore) -> ClusterState {
        let desired = GrafanaReconciler::new(config, None).reconcile(grafana, &ClusterState::default());
        let owner = grafana.controller_owner_ref(&()).unwrap();
        let mut state = ClusterState::default();
        for action in desired.actions {
            let mut target = action.target;
            stamp_owner(target.meta_mut(), &owner);
            target.meta_mut().resource_version = Some("100".to_string());
            let name = target.meta().name.clone().unwrap_or_default();
            match target {
                ManagedObject::Service(o) => state.service = Some(o),
                ManagedObject::ServiceAccount(o) => state.service_account = Some(o),
                ManagedObject::ConfigMap(o) if name == GRAFANA_CONFIG_MAP_NAME => state.config = Some(o),
                ManagedObject::ConfigMap(o) => state.dashboards_config = Some(o),
                ManagedObject::Deployment(o) => state.deployment = Some(o),
                ManagedObject::Ingress(o) => state.ingress = Some(o),
            }
        }
        state
    }

    #[test]
    fn test_fixed_action_order_on_empty_cluster() {
        let config = ConfigStore::new();
        let mut grafana = grafana();
        grafana.spec.ingress.enabled = true;

        let desired = GrafanaReconciler::new(&config, None).reconcile(&grafana, &ClusterState::default());
        let order: Vec<String> = desired
            .actions
            .iter()
            .map(|a| format!("{} {}", a.kind.as_str(), a.target.meta().name.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            order,
            vec![
                format!("create {GRAFANA_SERVICE_NAME}"),
                format!("create {GRAFANA_SERVICE_ACCOUNT_NAME}"),
                format!("create {GRAFANA_CONFIG_MAP_NAME}"),
                format!("create {GRAFANA_DASHBOARDS_CONFIG_MAP_NAME}"),
                format!("create {GRAFANA_DEPLOYMENT_NAME}"),
                format!("create {GRAFANA_INGRESS_NAME}"),
            ]
        );
        assert!(desired.config_hash.is_some());
    }

    #[test]
    fn test_ingress_only_when_enabled() {
        let config = ConfigStore::new();
        let desired = GrafanaReconciler::new(&config, None).reconcile(&grafana(), &ClusterState::default());
        assert_eq!(desired.actions.len(), 5);
        assert!(desired.actions.iter().all(|a| !matches!(a.target, ManagedObject::Ingress(_))));
    }

    #[test]
    fn test_second_pass_is_all_no_op_updates() {
        let config = ConfigStore::new();
        let mut grafana = grafana();
        grafana.spec.ingress.enabled = true;
        let state = applied(&grafana, &config);

        let desired = GrafanaReconciler::new(&config, None).reconcile(&grafana, &state);
        assert_eq!(desired.actions.len(), 6);
        for action in desired.actions {
            assert_eq!(action.kind, ActionKind::Update);
            let current = match &action.target {
                ManagedObject::Service(_) => state.service.clone().map(ManagedObject::Service),
                ManagedObject::ServiceAccount(_) => state.service_account.clone().map(ManagedObject::ServiceAccount),
                ManagedObject::ConfigMap(cm) if cm.metadata.name.as_deref() == Some(GRAFANA_CONFIG_MAP_NAME) => {
                    state.config.clone().map(ManagedObject::ConfigMap)
                }
                ManagedObject::ConfigMap(_) => state.dashboards_config.clone().map(ManagedObject::ConfigMap),
                ManagedObject::Deployment(_) => state.deployment.clone().map(ManagedObject::Deployment),
                ManagedObject::Ingress(_) => state.ingress.clone().map(ManagedObject::Ingress),
            };
            assert_eq!(Some(action.target), current, "{}", action.message);
        }
    }

    #[test]
    fn test_broken_template_skips_only_the_config_action() {
        let config = ConfigStore::new();
        let mut grafana = grafana();
        grafana.status = Some(GrafanaStatus {
            last_config: Some("previous-hash".to_string()),
            ..Default::default()
        });

        let desired = GrafanaReconciler::new(&config, Some("[broken\nkey = value\n"))
            .reconcile(&grafana, &ClusterState::default());
        assert!(desired.config_hash.is_none());
        assert_eq!(desired.actions.len(), 4);
        assert!(desired.actions.iter().all(|a| {
            a.target.meta().name.as_deref() != Some(GRAFANA_CONFIG_MAP_NAME)
        }));

        // Deployment keeps the last known hash so pods are not rolled
        let deployment = desired
            .actions
            .into_iter()
            .find_map(|a| a.target.into_deployment())
            .unwrap();
        let annotations = deployment.spec.unwrap().template.metadata.unwrap().annotations.unwrap();
        assert_eq!(annotations.get(CONFIG_HASH_ANNOTATION).map(String::as_str), Some("previous-hash"));
    }

    #[test]
    fn test_merge_service_keeps_cluster_assigned_fields() {
        let config = ConfigStore::new();
        let grafana = grafana();
        let mut old = service(&grafana, &config);
        old.metadata.resource_version = Some("12".to_string());
        let old_spec = old.spec.as_mut().unwrap();
        old_spec.cluster_ip = Some("10.0.0.12".to_string());
        old_spec.cluster_ips = Some(vec!["10.0.0.12".to_string()]);
        old_spec.ports.as_mut().unwrap()[0].node_port = Some(31000);

        let mut new = service(&grafana, &config);
        new.spec.as_mut().unwrap().type_ = Some("NodePort".to_string());
        let merged = merge_service(&old, new);

        assert_eq!(merged.metadata.resource_version.as_deref(), Some("12"));
        let spec = merged.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.0.0.12"));
        assert_eq!(spec.cluster_ips, Some(vec!["10.0.0.12".to_string()]));
        assert_eq!(spec.ports.unwrap()[0].node_port, Some(31000));
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));
    }

    #[test]
    fn test_merge_service_account_keeps_token_secrets() {
        let grafana = grafana();
        let mut old = service_account(&grafana);
        old.metadata.resource_version = Some("3".to_string());
        old.secrets = Some(vec![ObjectReference {
            name: Some("grafana-token-abcde".to_string()),
            ..Default::default()
        }]);
        old.image_pull_secrets = Some(vec![LocalObjectReference {
            name: "registry".to_string(),
        }]);

        let merged = merge_service_account(&old, service_account(&grafana));
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("3"));
        assert_eq!(merged.secrets, old.secrets);
        assert_eq!(merged.image_pull_secrets, old.image_pull_secrets);
    }

    #[test]
    fn test_merge_dashboards_config_keeps_imported_dashboards() {
        let grafana = grafana();
        let mut old = create_test_config_map("monitoring", GRAFANA_DASHBOARDS_CONFIG_MAP_NAME);
        old.data = Some(BTreeMap::from([("apps_overview.json".to_string(), "{}".to_string())]));

        let merged = merge_dashboards_config(
            &old,
            crate::reconciler::model::config_map::dashboards_config(&grafana),
        );
        assert_eq!(merged.data, old.data);
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("7"));
    }

    #[test]
    fn test_merge_deployment_keeps_scaled_replicas() {
        let config = ConfigStore::new();
        let mut grafana = grafana();
        grafana.spec.initial_replicas = Some(1);
        let mut old = deployment(&grafana, &config, Some("a"));
        old.spec.as_mut().unwrap().replicas = Some(4);
        old.metadata.resource_version = Some("9".to_string());

        let merged = merge_deployment(&old, deployment(&grafana, &config, Some("b")));
        assert_eq!(merged.spec.as_ref().unwrap().replicas, Some(4));
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("9"));
        let annotations = merged.spec.unwrap().template.metadata.unwrap().annotations.unwrap();
        assert_eq!(annotations.get(CONFIG_HASH_ANNOTATION).map(String::as_str), Some("b"));
    }

    #[test]
    fn test_deployment_carries_installed_plugins_and_overrides() {
        let config = ConfigStore::new();
        config.set(Setting::GrafanaImageTag, "7.5.0");
        config.set(Setting::PodLabelValue, "grafana-ops");
        let mut grafana = grafana();
        grafana.status = Some(GrafanaStatus {
            installed_plugins: vec![
                GrafanaPlugin::new("grafana-clock-panel", "1.0.1"),
                GrafanaPlugin::new("grafana-piechart-panel", "1.3.6"),
            ]
            .into(),
            ..Default::default()
        });

        let deployment = deployment(&grafana, &config, None);
        assert_eq!(
            plugins_env(&deployment),
            Some("grafana-clock-panel:1.0.1,grafana-piechart-panel:1.3.6")
        );
        let pod = deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        assert_eq!(pod.containers[0].image.as_deref(), Some("docker.io/grafana/grafana:7.5.0"));
        let labels = deployment.spec.as_ref().unwrap().selector.match_labels.clone().unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("grafana-ops"));
    }
}
