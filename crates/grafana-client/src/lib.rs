//! Grafana HTTP Client
//!
//! Fetches remote dashboard definitions and checks plugin availability against the
//! Grafana plugin registry.
//!
//! # Example
//!
//! ```no_run
//! use grafana_client::{GrafanaHttpClient, GrafanaHttpClientTrait, DEFAULT_PLUGINS_URL};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GrafanaHttpClient::new(DEFAULT_PLUGINS_URL)?;
//!
//! // Download a dashboard definition
//! let json = client.fetch_dashboard("https://example.com/dashboards/overview.json").await?;
//!
//! // Check that a plugin release exists before installing it
//! let exists = client.plugin_exists("grafana-clock-panel", "1.0.1").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod grafana_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{DEFAULT_PLUGINS_URL, GrafanaHttpClient};
pub use error::GrafanaClientError;
pub use grafana_trait::GrafanaHttpClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockGrafanaHttpClient;
