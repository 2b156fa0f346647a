//! Unit tests for the Grafana controller

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cluster::{ManagedKind, ManagedObject};
    use crate::config::ConfigStore;
    use crate::constants::*;
    use crate::error::ControllerError;
    use crate::events::PROCESSING_ERROR;
    use crate::reconcile_helpers::ReconcileOutcome;
    use crate::reconciler::grafana::GrafanaController;
    use crate::reconciler::model::deployment::plugins_env;
    use crate::test_utils::*;
    use crds::{DashboardLabelSelector, Grafana, GrafanaPhase, GrafanaPlugin, GrafanaStatus, PluginList};
    use grafana_client::MockGrafanaHttpClient;

    struct Harness {
        cluster: Arc<MockClusterClient>,
        grafanas: Arc<MockResourceClient<Grafana>>,
        events: Arc<MockEventSink>,
        registry: Arc<MockGrafanaHttpClient>,
        config: Arc<ConfigStore>,
        controller: GrafanaController,
    }

    fn grafana() -> Grafana {
        let mut grafana = create_test_grafana("grafana", "monitoring");
        grafana.spec.dashboard_label_selector = vec![DashboardLabelSelector::with_labels([("app", "grafana")])];
        grafana
    }

    fn harness(grafana: Grafana) -> Harness {
        let cluster = Arc::new(MockClusterClient::new());
        let grafanas = Arc::new(MockResourceClient::with_object(grafana));
        let events = Arc::new(MockEventSink::default());
        let registry = Arc::new(MockGrafanaHttpClient::new());
        let config = Arc::new(ConfigStore::new());
        let controller = GrafanaController::new(
            cluster.clone(),
            grafanas.clone(),
            events.clone(),
            registry.clone(),
            config.clone(),
            None,
            test_metrics(),
        );
        Harness {
            cluster,
            grafanas,
            events,
            registry,
            config,
            controller,
        }
    }

    fn last_status(h: &Harness) -> GrafanaStatus {
        h.grafanas
            .status_writes()
            .last()
            .and_then(|g| g.status.clone())
            .unwrap()
    }

    fn deployed_plugins(h: &Harness) -> Option<String> {
        h.cluster
            .object(ManagedKind::Deployment, "monitoring", GRAFANA_DEPLOYMENT_NAME)
            .and_then(ManagedObject::into_deployment)
            .and_then(|d| plugins_env(&d).map(str::to_string))
    }

    fn request(origin: &str, name: &str, version: &str) -> PluginList {
        vec![GrafanaPlugin::new(name, version).with_origin(origin)].into()
    }

    #[tokio::test]
    async fn test_first_pass_creates_everything_and_publishes_config() {
        let h = harness(grafana());

        let outcome = h.controller.reconcile(&grafana()).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));

        let writes = h.cluster.writes();
        assert_eq!(writes.len(), 5);
        assert!(writes.iter().all(|w| w.starts_with("create ")));

        let status = last_status(&h);
        assert_eq!(status.phase, GrafanaPhase::Reconciling);
        assert_eq!(status.last_config.as_ref().map(String::len), Some(64));

        assert_eq!(h.config.operator_namespace().as_deref(), Some("monitoring"));
        assert_eq!(h.config.dashboard_selectors(), Some(grafana().spec.dashboard_label_selector));
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_updates_in_place() {
        let h = harness(grafana());
        h.controller.reconcile(&grafana()).await.unwrap();
        h.controller.reconcile(&grafana()).await.unwrap();

        let writes = h.cluster.writes();
        assert_eq!(writes.len(), 10);
        assert!(writes[5..].iter().all(|w| w.starts_with("update ")));
    }

    #[tokio::test]
    async fn test_missing_grafana_pauses_dashboard_imports() {
        let h = harness(grafana());
        h.config.set_dashboard_selectors(grafana().spec.dashboard_label_selector);
        h.grafanas.remove("monitoring", "grafana");

        let outcome = h.controller.reconcile(&grafana()).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(h.config.dashboard_selectors().is_none());
        assert!(h.cluster.writes().is_empty());
    }

    #[tokio::test]
    async fn test_action_failure_marks_failing() {
        let h = harness(grafana());
        h.cluster
            .fail_writes(ManagedKind::Deployment, GRAFANA_DEPLOYMENT_NAME, MockFailure::Unavailable);

        let err = h.controller.reconcile(&grafana()).await.unwrap_err();
        assert!(matches!(err, ControllerError::ActionFailed { index: 4, .. }));
        assert_eq!(h.cluster.writes().len(), 5);

        assert_eq!(last_status(&h).phase, GrafanaPhase::Failing);
        let events = h.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, PROCESSING_ERROR);
    }

    #[tokio::test]
    async fn test_failure_with_conflicting_status_write_requeues() {
        let h = harness(grafana());
        h.cluster
            .fail_writes(ManagedKind::Service, GRAFANA_SERVICE_NAME, MockFailure::Unavailable);
        h.grafanas.fail_status_writes(409);

        let outcome = h.controller.reconcile(&grafana()).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
        assert_eq!(h.events.events().len(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_status_write_counts_as_success() {
        let h = harness(grafana());
        h.grafanas.fail_status_writes(409);

        let outcome = h.controller.reconcile(&grafana()).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_DELAY));
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_failed_status_write_is_a_failure() {
        let h = harness(grafana());
        h.grafanas.fail_status_writes(500);

        let err = h.controller.reconcile(&grafana()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Kube(_)));
        assert_eq!(h.events.events().len(), 1);
    }

    #[tokio::test]
    async fn test_plugins_applied_after_quiet_period() {
        let h = harness(grafana());
        h.registry.add_plugin("grafana-clock-panel", "1.0.1");
        h.config
            .set_plugins_for("apps/overview", request("apps/overview", "grafana-clock-panel", "1.0.1"));
        h.config.backdate_plugins_updated(chrono::Duration::seconds(10));

        h.controller.reconcile(&grafana()).await.unwrap();

        let status = last_status(&h);
        assert_eq!(status.installed_plugins.to_env(), "grafana-clock-panel:1.0.1");
        assert!(status.failed_plugins.is_empty());
        assert_eq!(deployed_plugins(&h).as_deref(), Some("grafana-clock-panel:1.0.1"));
        assert_eq!(h.config.plugin_state().0, status.installed_plugins);
    }

    #[tokio::test]
    async fn test_plugins_wait_for_quiet_period() {
        let h = harness(grafana());
        h.registry.add_plugin("grafana-clock-panel", "1.0.1");
        h.config
            .set_plugins_for("apps/overview", request("apps/overview", "grafana-clock-panel", "1.0.1"));

        h.controller.reconcile(&grafana()).await.unwrap();

        assert!(last_status(&h).installed_plugins.is_empty());
        assert!(h.registry.plugin_requests().is_empty());
        assert_eq!(deployed_plugins(&h).as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unknown_plugin_is_marked_failed() {
        let h = harness(grafana());
        h.config
            .set_plugins_for("apps/overview", request("apps/overview", "no-such-panel", "0.0.1"));
        h.config.backdate_plugins_updated(chrono::Duration::seconds(10));

        h.controller.reconcile(&grafana()).await.unwrap();

        let status = last_status(&h);
        assert!(status.installed_plugins.is_empty());
        assert_eq!(status.failed_plugins.to_env(), "no-such-panel:0.0.1");
        assert_eq!(h.config.plugin_state().1, status.failed_plugins);

        // Not checked again
        h.controller.reconcile(&grafana()).await.unwrap();
        assert_eq!(h.registry.plugin_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_registry_keeps_installed_release() {
        let mut grafana = grafana();
        grafana.status = Some(GrafanaStatus {
            installed_plugins: request("apps/overview", "grafana-clock-panel", "1.0.1"),
            ..Default::default()
        });
        let h = harness(grafana.clone());
        h.registry.set_registry_down(true);
        h.config
            .set_plugins_for("apps/overview", request("apps/overview", "grafana-clock-panel", "2.0.0"));
        h.config.backdate_plugins_updated(chrono::Duration::seconds(10));

        h.controller.reconcile(&grafana).await.unwrap();

        let status = last_status(&h);
        assert_eq!(status.installed_plugins.to_env(), "grafana-clock-panel:1.0.1");
        assert!(status.failed_plugins.is_empty());
    }

    #[tokio::test]
    async fn test_registry_outage_does_not_fail_new_plugin() {
        let h = harness(grafana());
        h.registry.set_registry_down(true);
        h.config
            .set_plugins_for("apps/overview", request("apps/overview", "grafana-clock-panel", "1.0.1"));
        h.config.backdate_plugins_updated(chrono::Duration::seconds(10));

        h.controller.reconcile(&grafana()).await.unwrap();
        let status = last_status(&h);
        assert!(status.installed_plugins.is_empty());
        assert!(status.failed_plugins.is_empty());

        // Checked again once the registry answers
        h.registry.set_registry_down(false);
        h.registry.add_plugin("grafana-clock-panel", "1.0.1");
        h.controller.reconcile(&grafana()).await.unwrap();
        assert_eq!(h.registry.plugin_requests().len(), 2);
        assert_eq!(last_status(&h).installed_plugins.to_env(), "grafana-clock-panel:1.0.1");
    }
}
