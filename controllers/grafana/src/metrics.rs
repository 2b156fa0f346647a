//! Prometheus metrics and the HTTP endpoint serving them alongside health probes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::{error, info};

use crate::error::ControllerError;

/// Operator metrics, registered under the `grafana_operator_` prefix
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    reconcile_total: IntCounterVec,
    actions_total: IntCounterVec,
    registered_dashboards: IntGauge,
    ready: AtomicBool,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new_custom(Some("grafana_operator".to_string()), None)?;

        let reconcile_total = IntCounterVec::new(
            Opts::new("reconcile_total", "Reconciliation passes grouped by controller and result"),
            &["controller", "result"],
        )?;
        let actions_total = IntCounterVec::new(
            Opts::new("actions_total", "Cluster actions grouped by kind and result"),
            &["kind", "result"],
        )?;
        let registered_dashboards = IntGauge::new(
            "registered_dashboards",
            "Dashboards with a registered plugin request",
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(actions_total.clone()))?;
        registry.register(Box::new(registered_dashboards.clone()))?;

        Ok(Self {
            registry,
            reconcile_total,
            actions_total,
            registered_dashboards,
            ready: AtomicBool::new(false),
        })
    }

    pub fn record_reconcile(&self, controller: &str, result: &str) {
        self.reconcile_total.with_label_values(&[controller, result]).inc();
    }

    pub fn record_action(&self, kind: &str, result: &str) {
        self.actions_total.with_label_values(&[kind, result]).inc();
    }

    pub fn set_registered_dashboards(&self, count: usize) {
        self.registered_dashboards
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Flipped once the watchers are running
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String, ControllerError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> (StatusCode, String) {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn readyz_handler(State(metrics): State<Arc<Metrics>>) -> StatusCode {
    if metrics.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz_handler))
        .with_state(metrics)
}

/// Serves `/metrics`, `/healthz` and `/readyz` until the process exits
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving metrics and probes on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_prefixed_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_reconcile("grafana", "success");
        metrics.record_action("create", "error");
        metrics.set_registered_dashboards(3);

        let body = metrics.render().unwrap();
        assert!(body.contains("grafana_operator_reconcile_total{controller=\"grafana\",result=\"success\"} 1"));
        assert!(body.contains("grafana_operator_actions_total{kind=\"create\",result=\"error\"} 1"));
        assert!(body.contains("grafana_operator_registered_dashboards 3"));
    }

    #[test]
    fn test_readiness_flag() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.is_ready());
        metrics.set_ready();
        assert!(metrics.is_ready());
    }
}
