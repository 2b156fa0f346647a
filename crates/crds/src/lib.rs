//! Grafana Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Grafana operator controllers.

/// Grafana CRD
pub mod grafana;
/// GrafanaDashboard CRD
pub mod grafana_dashboard;
/// Plugin releases and lists
pub mod plugin;
/// Dashboard label selectors
pub mod selector;

pub use grafana::*;
pub use grafana_dashboard::*;
pub use plugin::*;
pub use selector::*;

/// API group shared by every CRD in this crate
pub const API_GROUP: &str = "integreatly.org";
