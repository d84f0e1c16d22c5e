//! Reconciliation logic for PodFlame CRDs.
//!
//! A pass re-reads the PodFlame and its profiler pod from the API server,
//! derives the current state from those live reads, and performs at most one
//! step towards the desired state:
//!
//! - the deletion protocol (`finalizer`) runs first;
//! - otherwise the profiler pod is created, waited on, harvested into the
//!   status, or deleted (`profiler`), per the table in `state`.
//!
//! Passes keep no memory between invocations, so any pass can be repeated or
//! interrupted without harm. Passes for the *same* PodFlame must not overlap;
//! `kube_runtime::Controller` guarantees this by never running two reconciles
//! for one object reference at a time. Callers driving [`Reconciler`] by other
//! means must provide the same serialization.

mod finalizer;
mod profiler;
pub mod state;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use cluster_client::ClusterClientTrait;
use state::{ChildPhase, FinalizerStep, RunOutcome, finalizer_step};
use std::time::Duration;
use tracing::{debug, info};

/// Delay before the follow-up pass of a multi-pass transition
const FOLLOW_UP_DELAY: Duration = Duration::from_secs(1);

/// Delay between checks while child pods are still terminating
const CLEANUP_POLL_DELAY: Duration = Duration::from_secs(5);

/// What a pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// PodFlame no longer exists
    Gone,
    /// Cleanup finalizer added; the next pass does the real work
    FinalizerAdded,
    /// Children removed and finalizer released
    Finalized,
    /// Children deleted but some are still terminating
    AwaitingCleanup { remaining: usize },
    /// Being deleted and already released by this controller
    AlreadyFinalized,
    /// Profiler pod created
    ProfilerCreated,
    /// Profiler pod not finished yet
    ProfilerWaiting(ChildPhase),
    /// Profiler output written to the status
    Harvested { outcome: RunOutcome, truncated: bool },
    /// Profiler pod of a finished run deleted
    ProfilerDeleted,
    /// Run finished and cleaned up; nothing to do
    Complete,
}

impl ReconcileOutcome {
    /// When to run the next pass without waiting for a change notification
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            // Neither the finalizer write nor our own status write triggers a
            // pass through the change filter, so schedule the follow-up here
            ReconcileOutcome::FinalizerAdded | ReconcileOutcome::Harvested { .. } => Some(FOLLOW_UP_DELAY),
            ReconcileOutcome::AwaitingCleanup { .. } => Some(CLEANUP_POLL_DELAY),
            _ => None,
        }
    }
}

/// Reconciles PodFlame resources.
pub struct Reconciler {
    pub(crate) client: Box<dyn ClusterClientTrait + Send + Sync>,
    pub(crate) config: OperatorConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(client: Box<dyn ClusterClientTrait + Send + Sync>, config: OperatorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Runs one pass for the PodFlame `namespace/name`.
    ///
    /// Any error aborts the pass before further writes; the caller re-runs the
    /// whole pass later.
    pub async fn reconcile_podflame(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        let podflame = match self.client.get_podflame(namespace, name).await {
            Ok(pf) => pf,
            Err(e) if e.is_not_found() => {
                debug!("PodFlame {}/{} not found, must have been deleted", namespace, name);
                return Ok(ReconcileOutcome::Gone);
            }
            Err(e) => return Err(e.into()),
        };

        match finalizer_step(&podflame) {
            FinalizerStep::Add => self.add_finalizer(&podflame).await,
            FinalizerStep::Cleanup => self.finalize(&podflame).await,
            FinalizerStep::Done => {
                debug!("PodFlame {}/{} already finalized", namespace, name);
                Ok(ReconcileOutcome::AlreadyFinalized)
            }
            FinalizerStep::Proceed => {
                let outcome = self.reconcile_profiler(&podflame).await?;
                info!("Reconciled PodFlame {}/{}: {:?}", namespace, name, outcome);
                Ok(outcome)
            }
        }
    }
}
