//! Kubernetes Events for reconcile failures.
//!
//! Publishing is fire-and-forget: a failed publish is logged and never fails a pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

use crate::constants::CONTROLLER_NAME;

/// Reason used on failed primary reconciles
pub const PROCESSING_ERROR: &str = "ProcessingError";

/// Action reported on every event
pub const RECONCILE_ACTION: &str = "Reconcile";

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishes a Warning event about `object`
    async fn warning(&self, object: &ObjectReference, reason: &str, note: String);
}

/// [`EventSink`] backed by the kube-runtime [`Recorder`]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("HOSTNAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn warning(&self, object: &ObjectReference, reason: &str, note: String) {
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(note),
            action: RECONCILE_ACTION.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object).await {
            warn!(reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}
