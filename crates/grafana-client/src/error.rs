//! Grafana client errors

use thiserror::Error;

/// Errors that can occur when talking to dashboard sources or the plugin registry
#[derive(Debug, Error)]
pub enum GrafanaClientError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with something other than 200 OK
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    /// URL is not an absolute http(s) URL
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
}
