//! Profiler pod lifecycle: create, harvest, delete.

use super::state::{PassAction, RunOutcome, decide};
use super::{ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use crate::pod_builder::{build_profiler_pod, profiler_pod_name};
use crate::runtime::runtime_host_path;
use crate::target::resolve_target;
use cluster_client::{PodLogs, ProfilerEvent};
use crds::{PodFlame, PodFlameStatus};
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// Status text of a successful run that printed nothing
pub const EMPTY_SUCCESS_OUTPUT: &str = "profiler produced no output";

/// Status text of a failed run that printed nothing
pub const EMPTY_FAILURE_OUTPUT: &str = "profiler pod failed without log output";

/// Status recording the harvested output of a finished run.
///
/// Always terminal: an empty log is replaced by a fixed failure message.
pub fn harvested_status(outcome: RunOutcome, logs: &PodLogs) -> PodFlameStatus {
    match (outcome, logs.is_empty()) {
        (RunOutcome::Succeeded, false) => PodFlameStatus::succeeded(logs.content.clone()),
        (RunOutcome::Succeeded, true) => PodFlameStatus::failed(EMPTY_SUCCESS_OUTPUT),
        (RunOutcome::Failed, false) => PodFlameStatus::failed(logs.content.clone()),
        (RunOutcome::Failed, true) => PodFlameStatus::failed(EMPTY_FAILURE_OUTPUT),
    }
}

impl Reconciler {
    /// Drives the profiler pod of a live, non-deleting PodFlame one step
    pub(super) async fn reconcile_profiler(&self, podflame: &PodFlame) -> Result<ReconcileOutcome, ControllerError> {
        let namespace = self.config.operator_namespace.as_str();
        let pod_name = profiler_pod_name(podflame);

        let child = match self.client.get_pod(namespace, &pod_name).await {
            Ok(pod) => Some(pod),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        match decide(podflame.is_terminal(), child.as_ref()) {
            PassAction::CreateProfiler => self.create_profiler(podflame).await,
            PassAction::Idle => Ok(ReconcileOutcome::Complete),
            PassAction::DeleteProfiler => self.delete_profiler(namespace, &pod_name).await,
            PassAction::Harvest(outcome) => self.harvest(podflame, namespace, &pod_name, outcome).await,
            PassAction::Wait(phase) => {
                debug!("Profiler pod {}/{} is {}", namespace, pod_name, phase);
                Ok(ReconcileOutcome::ProfilerWaiting(phase))
            }
        }
    }

    async fn create_profiler(&self, podflame: &PodFlame) -> Result<ReconcileOutcome, ControllerError> {
        let target = resolve_target(self.client.as_ref(), podflame).await?;
        let host_path = runtime_host_path(&target.runtime)?;
        let pod = build_profiler_pod(
            podflame,
            &target,
            host_path,
            &self.config.operator_namespace,
            &self.config.agent_image,
        )?;

        self.client.create_pod(&self.config.operator_namespace, &pod).await?;
        info!(
            "Created profiler pod {}/{} for container {} of pod {} on node {}",
            self.config.operator_namespace,
            pod.name_any(),
            target.container_name,
            target.pod_name,
            target.node_name
        );

        // The pod exists now; a lost event must not fail the pass
        let event = ProfilerEvent::normal(
            "Created",
            "CreateProfiler",
            format!(
                "Profiling container {} of pod {} on node {}",
                target.container_name, target.pod_name, target.node_name
            ),
        );
        if let Err(e) = self.client.publish_event(podflame, event).await {
            warn!("Failed to publish creation event for PodFlame {}: {}", podflame.name_any(), e);
        }
        Ok(ReconcileOutcome::ProfilerCreated)
    }

    async fn harvest(
        &self,
        podflame: &PodFlame,
        namespace: &str,
        pod_name: &str,
        outcome: RunOutcome,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let logs = self
            .client
            .read_pod_logs(namespace, pod_name, self.config.log_limit_bytes)
            .await?;
        if logs.truncated {
            warn!(
                "Output of profiler pod {}/{} exceeds {} bytes, keeping the first {}",
                namespace,
                pod_name,
                self.config.log_limit_bytes,
                logs.content.len()
            );
        }

        let status = harvested_status(outcome, &logs);
        self.write_terminal_status(podflame, &status).await?;
        info!(
            "Recorded {:?} outcome of PodFlame {}/{}",
            outcome,
            podflame.namespace().unwrap_or_default(),
            podflame.name_any()
        );
        Ok(ReconcileOutcome::Harvested {
            outcome,
            truncated: logs.truncated,
        })
    }

    /// Writes a terminal status exactly once.
    ///
    /// Refuses when `podflame` already shows a terminal status. The write is
    /// conditional on the resourceVersion that was read, so a concurrent
    /// writer makes it fail with a conflict instead of being overwritten.
    pub(crate) async fn write_terminal_status(
        &self,
        podflame: &PodFlame,
        status: &PodFlameStatus,
    ) -> Result<PodFlame, ControllerError> {
        if podflame.is_terminal() {
            return Err(ControllerError::StatusAlreadyTerminal(podflame.name_any()));
        }
        Ok(self.client.patch_podflame_status(podflame, status).await?)
    }

    async fn delete_profiler(&self, namespace: &str, pod_name: &str) -> Result<ReconcileOutcome, ControllerError> {
        match self.client.delete_pod(namespace, pod_name).await {
            Ok(()) => info!("Deleted profiler pod {}/{}", namespace, pod_name),
            Err(e) if e.is_not_found() => debug!("Profiler pod {}/{} already gone", namespace, pod_name),
            Err(e) => return Err(e.into()),
        }
        Ok(ReconcileOutcome::ProfilerDeleted)
    }
}
