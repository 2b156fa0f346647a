//! Helpers shared by the reconcilers

use std::time::Duration;

use kube::ResourceExt;
use kube_runtime::controller::Action;

/// What the scheduler should do after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the object changes
    Done,
    /// Run again after the delay even without new events
    RequeueAfter(Duration),
}

impl ReconcileOutcome {
    pub fn into_action(self) -> Action {
        match self {
            ReconcileOutcome::Done => Action::await_change(),
            ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

/// `namespace/name`, the key used for logs and per-object backoff
pub fn object_key<K: ResourceExt>(object: &K) -> String {
    format!("{}/{}", object.namespace().unwrap_or_default(), object.name_any())
}
