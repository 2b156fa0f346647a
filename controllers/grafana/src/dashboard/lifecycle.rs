//! Dashboard lifecycle state machine.
//!
//! Pure `(phase, observation) -> (next phase, effect)` table; the controller performs
//! the effect. A new dashboard always passes through `FinalizerPending`.

use crds::DashboardPhase;

/// What the controller sees on the dashboard this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Deletion timestamp is set
    pub deleting: bool,
    /// Our cleanup finalizer is registered
    pub has_finalizer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Write the next phase to the status
    PersistPhase,
    /// Add the cleanup finalizer, phase unchanged
    RegisterFinalizer,
    /// Import the dashboard content
    Import,
    /// Remove the dashboard and its plugin requests, then release the finalizer
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: DashboardPhase,
    pub effect: Effect,
}

pub fn transition(phase: DashboardPhase, observation: Observation) -> Transition {
    if observation.deleting {
        return Transition {
            next: phase,
            effect: Effect::Cleanup,
        };
    }

    match phase {
        DashboardPhase::Uninitialized => Transition {
            next: DashboardPhase::FinalizerPending,
            effect: Effect::PersistPhase,
        },
        DashboardPhase::FinalizerPending if !observation.has_finalizer => Transition {
            next: DashboardPhase::FinalizerPending,
            effect: Effect::RegisterFinalizer,
        },
        DashboardPhase::FinalizerPending => Transition {
            next: DashboardPhase::Created,
            effect: Effect::PersistPhase,
        },
        DashboardPhase::Created => Transition {
            next: DashboardPhase::Created,
            effect: Effect::Import,
        },
    }
}
