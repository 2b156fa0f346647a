//! Grafana CRD
//!
//! Declares a Grafana installation. The operator turns one `Grafana` object into
//! a Service, ServiceAccount, two ConfigMaps, a Deployment and (optionally) an Ingress.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plugin::PluginList;
use crate::selector::DashboardLabelSelector;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "integreatly.org",
    version = "v1alpha1",
    kind = "Grafana",
    namespaced,
    status = "GrafanaStatus",
    shortname = "graf"
)]
#[serde(rename_all = "camelCase")]
/// Desired Grafana installation
pub struct GrafanaSpec {
    /// Grafana admin user name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,

    /// Grafana admin password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,

    /// Enable anonymous access
    #[serde(default)]
    pub anonymous: bool,

    /// Enable basic authentication
    #[serde(default)]
    pub basic_auth: bool,

    /// Hide the login form
    #[serde(default)]
    pub disable_login_form: bool,

    /// Hide the sign-out menu
    #[serde(default)]
    pub disable_signout_menu: bool,

    /// Grafana log level (debug, info, warn, error, critical)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Replica count used when the Deployment is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_replicas: Option<i32>,

    /// Service settings
    #[serde(default)]
    pub service: GrafanaServiceSpec,

    /// Ingress settings
    #[serde(default)]
    pub ingress: GrafanaIngressSpec,

    /// Dashboards are imported when their labels match ANY of these selectors
    #[serde(default)]
    pub dashboard_label_selector: Vec<DashboardLabelSelector>,

    /// Override for the Grafana image (repository, without tag)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,

    /// Override for the Grafana image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image_tag: Option<String>,

    /// Override for the plugins init container image (repository, without tag)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_image: Option<String>,

    /// Override for the plugins init container image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_image_tag: Option<String>,
}

/// Service exposing Grafana
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaServiceSpec {
    /// Service type (ClusterIP, NodePort, LoadBalancer)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    /// Extra labels on the Service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Extra annotations on the Service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Optional Ingress in front of the Service
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaIngressSpec {
    /// Create an Ingress for the Grafana Service
    #[serde(default)]
    pub enabled: bool,

    /// Host name routed to Grafana
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// HTTP path routed to Grafana (defaults to "/")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Terminate TLS at the Ingress
    #[serde(default)]
    pub tls_enabled: bool,

    /// Secret holding the TLS certificate, used when `tlsEnabled` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret_name: Option<String>,

    /// Extra labels on the Ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Extra annotations on the Ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Observed state of a Grafana
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaStatus {
    /// Outcome of the most recent reconciliation
    #[serde(default)]
    pub phase: GrafanaPhase,

    /// Plugins currently handed to the init container
    #[serde(default)]
    pub installed_plugins: PluginList,

    /// Plugins that could not be found in the plugin registry
    #[serde(default)]
    pub failed_plugins: PluginList,

    /// Hash of the last rendered grafana.ini
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_config: Option<String>,
}

/// Grafana reconciliation phase
///
/// Serializes as PascalCase and also accepts the lowercase spelling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum GrafanaPhase {
    /// Last pass completed and all actions were applied
    #[default]
    #[serde(alias = "reconciling")]
    Reconciling,

    /// Last pass stopped on an error
    #[serde(alias = "failing")]
    Failing,
}
