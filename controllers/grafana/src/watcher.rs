//! Kubernetes resource watchers.
//!
//! Both controllers run through the generic `watch_resource()` helper on top of
//! kube_runtime::Controller, which serializes passes per object, reconnects watches
//! and schedules requeues. Failed passes are retried with a per-object Fibonacci backoff.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crds::{Grafana, GrafanaDashboard};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Api, Client, Resource};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffTracker;
use crate::constants::REQUEUE_DELAY;
use crate::dashboard::DashboardController;
use crate::error::ControllerError;
use crate::reconcile_helpers::{ReconcileOutcome, object_key};
use crate::reconciler::grafana::GrafanaController;

/// Longest delay between retries of a failing object
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(300);

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<ReconcileOutcome, ControllerError>> + Send>>;

/// Generic watcher helper around kube_runtime::Controller.
///
/// `configure` adds secondary watches (owned objects) before the controller starts.
/// Runs until the process receives a shutdown signal.
async fn watch_resource<K, C, F>(
    api: Api<K>,
    context: Arc<C>,
    reconcile_fn: F,
    configure: impl FnOnce(Controller<K>) -> Controller<K>,
    resource_name: &'static str,
) -> Result<(), ControllerError>
where
    K: Resource + Clone + Send + Sync + 'static + Debug + DeserializeOwned,
    K::DynamicType: Default + Eq + Hash + Clone + Debug + Unpin,
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);
    let backoff = Arc::new(BackoffTracker::new(REQUEUE_DELAY, MAX_ERROR_BACKOFF));

    let error_policy = {
        let backoff = backoff.clone();
        move |obj: Arc<K>, error: &ControllerError, _ctx: Arc<C>| {
            let key = object_key(obj.as_ref());
            let delay = backoff.next_delay(&key);
            warn!("Reconciliation of {} {} failed, retrying in {:?}: {}", resource_name, key, delay, error);
            Action::requeue(delay)
        }
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<C>| {
        let reconcile_fn = reconcile_fn.clone();
        let backoff = backoff.clone();
        async move {
            let key = object_key(obj.as_ref());
            debug!("Reconciling {} {}", resource_name, key);
            let outcome = reconcile_fn(ctx, obj).await?;
            backoff.reset(&key);
            Ok::<Action, ControllerError>(outcome.into_action())
        }
    };

    // Debounce batches bursts of status writes into one pass
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    configure(Controller::new(api, watcher::Config::default()))
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    info!("{} watcher stopped", resource_name);
    Ok(())
}

/// Watches Grafana and GrafanaDashboard resources
pub struct Watcher {
    client: Client,
    namespace: Option<String>,
    grafana: Arc<GrafanaController>,
    dashboards: Arc<DashboardController>,
}

impl Watcher {
    pub fn new(
        client: Client,
        namespace: Option<String>,
        grafana: Arc<GrafanaController>,
        dashboards: Arc<DashboardController>,
    ) -> Self {
        Self {
            client,
            namespace,
            grafana,
            dashboards,
        }
    }

    /// Namespaced when WATCH_NAMESPACE is set, cluster-wide otherwise
    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    /// Starts watching Grafana resources and the objects they own.
    pub async fn watch_grafanas(&self) -> Result<(), ControllerError> {
        let deployments: Api<Deployment> = self.api();
        let services: Api<Service> = self.api();
        let service_accounts: Api<ServiceAccount> = self.api();
        let config_maps: Api<ConfigMap> = self.api();
        let ingresses: Api<Ingress> = self.api();

        watch_resource(
            self.api::<Grafana>(),
            self.grafana.clone(),
            |controller, grafana| Box::pin(async move { controller.reconcile(&grafana).await }),
            move |c| {
                c.owns(deployments, watcher::Config::default())
                    .owns(services, watcher::Config::default())
                    .owns(service_accounts, watcher::Config::default())
                    .owns(config_maps, watcher::Config::default())
                    .owns(ingresses, watcher::Config::default())
            },
            "Grafana",
        )
        .await
    }

    /// Starts watching GrafanaDashboard resources.
    pub async fn watch_dashboards(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.api::<GrafanaDashboard>(),
            self.dashboards.clone(),
            |controller, dashboard| Box::pin(async move { controller.reconcile(&dashboard).await }),
            |c| c,
            "GrafanaDashboard",
        )
        .await
    }
}
