//! Grafana Operator
//!
//! Runs two controllers in one process:
//! - Grafana: manages the Grafana Deployment and everything around it, and applies
//!   the plugins requested by dashboards
//! - GrafanaDashboard: imports dashboards into the instance and registers their plugins
//!
//! Both share one ConfigStore for cross-controller state.

mod backoff;
mod cluster;
mod config;
mod constants;
mod controller;
mod dashboard;
mod error;
mod events;
mod hash;
mod metrics;
mod plugins;
mod reconcile_helpers;
mod reconciler;
mod resources;
mod settings;
mod watcher;

#[cfg(test)]
mod test_utils;

use controller::Controller;
use settings::OperatorSettings;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ControllerError;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both link rustls; pick the provider explicitly
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting Grafana Operator");

    let settings = OperatorSettings::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", settings.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Template path: {}", settings.template_path.display());
    info!("  Plugins URL: {}", settings.plugins_url);
    info!("  Metrics address: {}", settings.metrics_addr);

    let controller = Controller::new(settings).await?;
    controller.run().await?;

    Ok(())
}
