//! Decision table of a reconciliation pass.
//!
//! Pure functions: given what a pass observed, pick the single action it
//! performs. All cluster I/O lives in the reconciler.

use crds::PodFlame;
use k8s_openapi::api::core::v1::Pod;

/// Phase of the profiler pod as reported by the kubelet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Missing or unrecognised phase
    Unknown,
}

impl ChildPhase {
    pub fn of(pod: &Pod) -> Self {
        match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
            Some("Pending") => ChildPhase::Pending,
            Some("Running") => ChildPhase::Running,
            Some("Succeeded") => ChildPhase::Succeeded,
            Some("Failed") => ChildPhase::Failed,
            _ => ChildPhase::Unknown,
        }
    }
}

impl std::fmt::Display for ChildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChildPhase::Pending => "Pending",
            ChildPhase::Running => "Running",
            ChildPhase::Succeeded => "Succeeded",
            ChildPhase::Failed => "Failed",
            ChildPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of a profiling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// What a pass does with the profiler pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassAction {
    /// No pod, status empty: resolve the target and create the pod
    CreateProfiler,
    /// No pod, status terminal: nothing left to do
    Idle,
    /// Pod present, status terminal: clean the pod up
    DeleteProfiler,
    /// Pod finished, status empty: copy its output onto the status
    Harvest(RunOutcome),
    /// Pod still starting or running
    Wait(ChildPhase),
}

/// Picks the action for a PodFlame whose status is (not) terminal and whose
/// profiler pod is `child` (`None` when absent)
pub fn decide(status_terminal: bool, child: Option<&Pod>) -> PassAction {
    match (child, status_terminal) {
        (None, false) => PassAction::CreateProfiler,
        (None, true) => PassAction::Idle,
        (Some(_), true) => PassAction::DeleteProfiler,
        (Some(pod), false) => match ChildPhase::of(pod) {
            ChildPhase::Failed => PassAction::Harvest(RunOutcome::Failed),
            ChildPhase::Succeeded => PassAction::Harvest(RunOutcome::Succeeded),
            phase => PassAction::Wait(phase),
        },
    }
}

/// Step of the deletion protocol a PodFlame is at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerStep {
    /// Not being deleted and no finalizer yet
    Add,
    /// Not being deleted, finalizer present: run the profiler state machine
    Proceed,
    /// Being deleted, finalizer present: clean up children, then release
    Cleanup,
    /// Being deleted, finalizer already released
    Done,
}

pub fn finalizer_step(podflame: &PodFlame) -> FinalizerStep {
    match (podflame.is_being_deleted(), podflame.has_finalizer()) {
        (false, false) => FinalizerStep::Add,
        (false, true) => FinalizerStep::Proceed,
        (true, true) => FinalizerStep::Cleanup,
        (true, false) => FinalizerStep::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crds::PODFLAME_FINALIZER;

    fn child(phase: Option<&str>) -> Pod {
        let mut pod = Pod::default();
        if let Some(phase) = phase {
            pod.status = Some(k8s_openapi::api::core::v1::PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            });
        }
        pod
    }

    #[test]
    fn test_no_child() {
        assert_eq!(decide(false, None), PassAction::CreateProfiler);
        assert_eq!(decide(true, None), PassAction::Idle);
    }

    #[test]
    fn test_terminal_with_child_deletes_regardless_of_phase() {
        for phase in [None, Some("Pending"), Some("Running"), Some("Succeeded"), Some("Failed")] {
            assert_eq!(decide(true, Some(&child(phase))), PassAction::DeleteProfiler);
        }
    }

    #[test]
    fn test_finished_child_is_harvested() {
        assert_eq!(
            decide(false, Some(&child(Some("Succeeded")))),
            PassAction::Harvest(RunOutcome::Succeeded)
        );
        assert_eq!(
            decide(false, Some(&child(Some("Failed")))),
            PassAction::Harvest(RunOutcome::Failed)
        );
    }

    #[test]
    fn test_unfinished_child_waits() {
        assert_eq!(decide(false, Some(&child(Some("Pending")))), PassAction::Wait(ChildPhase::Pending));
        assert_eq!(decide(false, Some(&child(Some("Running")))), PassAction::Wait(ChildPhase::Running));
        assert_eq!(decide(false, Some(&child(Some("Evicted")))), PassAction::Wait(ChildPhase::Unknown));
        assert_eq!(decide(false, Some(&child(None))), PassAction::Wait(ChildPhase::Unknown));
    }

    #[test]
    fn test_finalizer_steps() {
        let mut pf = create_test_podflame("req1", "ns", "tp1", None);
        assert_eq!(finalizer_step(&pf), FinalizerStep::Add);

        pf.metadata.finalizers = Some(vec![PODFLAME_FINALIZER.to_string()]);
        assert_eq!(finalizer_step(&pf), FinalizerStep::Proceed);

        pf.metadata.deletion_timestamp =
            Some(serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap());
        assert_eq!(finalizer_step(&pf), FinalizerStep::Cleanup);

        pf.metadata.finalizers = Some(vec!["someone.else/finalizer".to_string()]);
        assert_eq!(finalizer_step(&pf), FinalizerStep::Done);
    }
}
