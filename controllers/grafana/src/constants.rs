//! Names, defaults and timings shared by both controllers.

use std::time::Duration;

pub const CONTROLLER_NAME: &str = "grafana-operator";

// Managed resource names
pub const GRAFANA_SERVICE_ACCOUNT_NAME: &str = "grafana-serviceaccount";
pub const GRAFANA_SERVICE_NAME: &str = "grafana-service";
pub const GRAFANA_CONFIG_MAP_NAME: &str = "grafana-config";
pub const GRAFANA_DASHBOARDS_CONFIG_MAP_NAME: &str = "grafana-dashboards";
pub const GRAFANA_DEPLOYMENT_NAME: &str = "grafana-deployment";
pub const GRAFANA_INGRESS_NAME: &str = "grafana-ingress";

pub const GRAFANA_CONFIG_FILE_NAME: &str = "grafana.ini";
pub const GRAFANA_CONTAINER_NAME: &str = "grafana";
pub const GRAFANA_PLUGINS_INIT_CONTAINER_NAME: &str = "grafana-plugins-init";
pub const GRAFANA_HTTP_PORT: i32 = 3000;
pub const GRAFANA_HTTP_PORT_NAME: &str = "grafana-http";

// Paths inside the Grafana pod
pub const GRAFANA_CONFIG_PATH: &str = "/etc/grafana";
pub const GRAFANA_DATA_PATH: &str = "/var/lib/grafana";
pub const GRAFANA_LOGS_PATH: &str = "/var/log/grafana";
pub const GRAFANA_PLUGINS_PATH: &str = "/var/lib/grafana/plugins";
pub const GRAFANA_PROVISIONING_PATH: &str = "/etc/grafana/provisioning";
pub const GRAFANA_DASHBOARDS_PATH: &str = "/etc/grafana-dashboards";

// Default images
pub const GRAFANA_IMAGE: &str = "docker.io/grafana/grafana";
pub const GRAFANA_VERSION: &str = "6.2.4";
pub const PLUGINS_INIT_CONTAINER_IMAGE: &str = "quay.io/integreatly/grafana_plugins_init";
pub const PLUGINS_INIT_CONTAINER_TAG: &str = "0.0.2";

/// Environment variable read by the plugins init container
pub const PLUGINS_ENV_VAR: &str = "GRAFANA_PLUGINS";

/// Label value selecting Grafana pods (`app=<value>`)
pub const POD_LABEL_DEFAULT_VALUE: &str = "grafana";

pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "secret";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";

/// Pod template annotation carrying the grafana.ini hash so config changes roll the pods
pub const CONFIG_HASH_ANNOTATION: &str = "integreatly.org/config-hash";

/// Finalizer that blocks dashboard deletion until the dashboard is removed from Grafana
pub const RESOURCE_FINALIZER_NAME: &str = "grafana.cleanup";

/// Delay before the next pass of any reconciler
pub const REQUEUE_DELAY: Duration = Duration::from_secs(15);

/// Plugin changes must settle this long before they are applied to the Deployment
pub const PLUGINS_MIN_AGE: Duration = Duration::from_secs(5);

pub const DEFAULT_TEMPLATE_PATH: &str = "./templates";
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
