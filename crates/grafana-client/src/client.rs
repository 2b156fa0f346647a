//! Grafana HTTP client
//!
//! Thin reqwest wrapper used for two things: downloading dashboard JSON from a URL and
//! probing the plugin registry for a specific plugin release.

use crate::error::GrafanaClientError;
use crate::grafana_trait::GrafanaHttpClientTrait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// Public Grafana plugin registry. `{name}` and `{version}` are substituted per request.
pub const DEFAULT_PLUGINS_URL: &str = "https://grafana.com/api/plugins/{name}/versions/{version}";

/// Request timeout for every outbound call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for dashboard sources and the plugin registry
#[derive(Debug, Clone)]
pub struct GrafanaHttpClient {
    client: Client,
    plugins_url: String,
}

impl GrafanaHttpClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `plugins_url` - registry URL template containing `{name}` and `{version}`
    pub fn new(plugins_url: impl Into<String>) -> Result<Self, GrafanaClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GrafanaClientError::Http)?;

        Ok(Self {
            client,
            plugins_url: plugins_url.into(),
        })
    }

    /// Registry URL for a plugin release
    pub fn plugin_url(&self, name: &str, version: &str) -> String {
        self.plugins_url
            .replace("{name}", &urlencoding::encode(name))
            .replace("{version}", &urlencoding::encode(version))
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, GrafanaClientError> {
        debug!("GET {}", url);
        self.client
            .get(url)
            .send()
            .await
            .map_err(GrafanaClientError::Http)
    }
}

/// Parses `raw` and insists on an absolute http(s) URL
pub fn parse_absolute_url(raw: &str) -> Result<Url, GrafanaClientError> {
    let url = Url::parse(raw.trim()).map_err(|_| GrafanaClientError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(GrafanaClientError::InvalidUrl(raw.to_string())),
    }
}

/// Maps a registry answer: 200 is known, 404 is unknown, anything else is an error
fn release_known(url: &str, status: StatusCode) -> Result<bool, GrafanaClientError> {
    match status {
        StatusCode::OK => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        other => Err(GrafanaClientError::Status {
            url: url.to_string(),
            status: other.as_u16(),
        }),
    }
}

#[async_trait::async_trait]
impl GrafanaHttpClientTrait for GrafanaHttpClient {
    async fn fetch_dashboard(&self, url: &str) -> Result<String, GrafanaClientError> {
        let parsed = parse_absolute_url(url)?;
        let response = self.get(parsed).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GrafanaClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(GrafanaClientError::Http)
    }

    async fn plugin_exists(&self, name: &str, version: &str) -> Result<bool, GrafanaClientError> {
        let parsed = parse_absolute_url(&self.plugin_url(name, version))?;
        let response = self.get(parsed).await?;
        let status = response.status();
        debug!("Plugin registry answered {} for {}@{}", status, name, version);
        release_known(response.url().as_str(), status)
    }
}
