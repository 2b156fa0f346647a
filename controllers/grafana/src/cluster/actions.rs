//! Ordered create/update actions and the runner that applies them.

use std::fmt;
use std::sync::Arc;

use crds::Grafana;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use tracing::info;

use super::{ClusterClient, ManagedObject};
use crate::error::ControllerError;
use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
        }
    }
}

/// One intended change to a managed object
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub target: ManagedObject,
    pub message: String,
}

impl Action {
    pub fn create(target: ManagedObject, message: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Create,
            target,
            message: message.into(),
        }
    }

    pub fn update(target: ManagedObject, message: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Update,
            target,
            message: message.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.target.describe())
    }
}

/// Makes `owner` the controller of `meta`, replacing any previous controller reference
pub fn stamp_owner(meta: &mut ObjectMeta, owner: &OwnerReference) {
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    references.retain(|r| r.controller != Some(true) && r.uid != owner.uid);
    references.push(owner.clone());
}

/// Applies actions strictly in order, stopping at the first failure
pub struct ActionRunner<'a> {
    client: &'a dyn ClusterClient,
    owner: OwnerReference,
    metrics: Option<Arc<Metrics>>,
}

impl<'a> ActionRunner<'a> {
    /// Runner stamping every target with `owner` as controller
    pub fn new(client: &'a dyn ClusterClient, owner: &Grafana) -> Result<Self, ControllerError> {
        let owner = owner
            .controller_owner_ref(&())
            .ok_or(ControllerError::MissingObjectKey(".metadata.uid"))?;
        Ok(Self {
            client,
            owner,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs every action. Returns how many were applied.
    ///
    /// On the first failure the remaining actions are skipped and the error carries the
    /// failing action's index and message. Earlier actions are not rolled back.
    pub async fn run_all(&self, actions: Vec<Action>) -> Result<usize, ControllerError> {
        let total = actions.len();
        for (index, action) in actions.into_iter().enumerate() {
            let Action { kind, mut target, message } = action;
            stamp_owner(target.meta_mut(), &self.owner);

            let result = match kind {
                ActionKind::Create => self.client.create(&target).await,
                ActionKind::Update => self.client.update(&target).await,
            };

            match result {
                Ok(()) => {
                    info!("({:5}) {:>10} {}", index, "SUCCESS", message);
                    self.record(kind, "success");
                }
                Err(source) => {
                    info!("({:5}) {:>10} {}: {}", index, "FAILED", message, source);
                    self.record(kind, "error");
                    return Err(ControllerError::ActionFailed { index, message, source });
                }
            }
        }
        Ok(total)
    }

    fn record(&self, kind: ActionKind, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_action(kind.as_str(), result);
        }
    }
}
