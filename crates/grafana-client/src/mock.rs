//! Mock GrafanaHttpClient for unit testing
//!
//! Serves dashboards and plugin releases from memory and counts every call so tests
//! can assert that no request was made.

use crate::error::GrafanaClientError;
use crate::grafana_trait::GrafanaHttpClientTrait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock GrafanaHttpClient for testing
#[derive(Clone, Default, Debug)]
pub struct MockGrafanaHttpClient {
    dashboards: Arc<Mutex<HashMap<String, String>>>,
    plugins: Arc<Mutex<HashSet<(String, String)>>>,
    registry_down: Arc<Mutex<bool>>,
    dashboard_requests: Arc<Mutex<Vec<String>>>,
    plugin_requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockGrafanaHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url` (for test setup)
    pub fn add_dashboard(&self, url: impl Into<String>, body: impl Into<String>) {
        self.dashboards.lock().unwrap().insert(url.into(), body.into());
    }

    /// Publish a plugin release in the fake registry (for test setup)
    pub fn add_plugin(&self, name: impl Into<String>, version: impl Into<String>) {
        self.plugins.lock().unwrap().insert((name.into(), version.into()));
    }

    /// Make every registry lookup fail as if the registry were unreachable
    pub fn set_registry_down(&self, down: bool) {
        *self.registry_down.lock().unwrap() = down;
    }

    pub fn dashboard_requests(&self) -> Vec<String> {
        self.dashboard_requests.lock().unwrap().clone()
    }

    pub fn plugin_requests(&self) -> Vec<(String, String)> {
        self.plugin_requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GrafanaHttpClientTrait for MockGrafanaHttpClient {
    async fn fetch_dashboard(&self, url: &str) -> Result<String, GrafanaClientError> {
        self.dashboard_requests.lock().unwrap().push(url.to_string());
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(GrafanaClientError::InvalidUrl(url.to_string()));
        }
        self.dashboards
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| GrafanaClientError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn plugin_exists(&self, name: &str, version: &str) -> Result<bool, GrafanaClientError> {
        self.plugin_requests
            .lock()
            .unwrap()
            .push((name.to_string(), version.to_string()));
        if *self.registry_down.lock().unwrap() {
            return Err(GrafanaClientError::Status {
                url: format!("registry/{name}/{version}"),
                status: 503,
            });
        }
        Ok(self
            .plugins
            .lock()
            .unwrap()
            .contains(&(name.to_string(), version.to_string())))
    }
}
