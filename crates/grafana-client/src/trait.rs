//! GrafanaHttpClient trait for mocking
//!
//! The controllers only depend on this trait so tests can swap in
//! [`MockGrafanaHttpClient`](crate::MockGrafanaHttpClient).

use crate::error::GrafanaClientError;

/// Outbound HTTP operations used by the operator
#[async_trait::async_trait]
pub trait GrafanaHttpClientTrait: Send + Sync {
    /// Downloads a dashboard definition. Only a 200 response counts as success.
    async fn fetch_dashboard(&self, url: &str) -> Result<String, GrafanaClientError>;

    /// Asks the plugin registry whether `name` is published at `version`.
    ///
    /// `Ok(false)` means the registry answered 404 for the release. Any other failure,
    /// including non-404 error statuses, is an `Err` and says nothing about the release.
    async fn plugin_exists(&self, name: &str, version: &str) -> Result<bool, GrafanaClientError>;
}
