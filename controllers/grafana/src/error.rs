//! Controller-specific error types.
//!
//! This module defines error types specific to the Grafana operator
//! that are not covered by upstream library errors.

use crate::cluster::ClusterError;
use crds::SelectorError;
use grafana_client::GrafanaClientError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Grafana operator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Error reading or writing a managed cluster object
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Dashboard source or plugin registry error
    #[error("Grafana client error: {0}")]
    GrafanaClient(#[from] GrafanaClientError),

    /// One action of a batch failed; earlier actions stay applied
    #[error("action {index} failed ({message}): {source}")]
    ActionFailed {
        index: usize,
        message: String,
        #[source]
        source: ClusterError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Shared configuration another controller publishes is not there yet
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A desired object could not be rendered
    #[error("Failed to build {resource}: {reason}")]
    Build { resource: &'static str, reason: String },

    /// Object lacks a field the operator relies on
    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    /// Dashboard label selector could not be evaluated
    #[error("Invalid label selector: {0}")]
    Selector(#[from] SelectorError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Local I/O error (templates, metrics listener)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Optimistic-concurrency conflict: someone else wrote the object first
    pub fn is_conflict(&self) -> bool {
        match self {
            ControllerError::Kube(KubeError::Api(response)) => response.code == 409,
            ControllerError::Cluster(e) => e.is_conflict(),
            ControllerError::ActionFailed { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}
