//! Filtering of PodFlame change notifications.
//!
//! Status writes made by the reconciler itself must not trigger another pass,
//! so PodFlame updates go through a [`ChangeFilter`] before they reach the
//! scheduler. Child pod events are not filtered.

use crds::PodFlame;
use kube::{Resource, ResourceExt};

/// Decides whether a PodFlame change warrants a reconciliation pass
pub trait ChangeFilter: Send + Sync {
    /// `old` is the last snapshot seen for the same object, `None` on first sight
    fn should_reconcile(&self, old: Option<&PodFlame>, new: &PodFlame) -> bool;
}

/// Reconciles on creation (or re-creation under the same name) and on spec,
/// label, annotation or deletion changes; ignores status-only updates
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreStatusChange;

impl ChangeFilter for IgnoreStatusChange {
    fn should_reconcile(&self, old: Option<&PodFlame>, new: &PodFlame) -> bool {
        let Some(old) = old else {
            return true;
        };
        old.meta().uid != new.meta().uid
            || old.meta().generation != new.meta().generation
            || old.labels() != new.labels()
            || old.annotations() != new.annotations()
            || old.meta().deletion_timestamp != new.meta().deletion_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_podflame;
    use crds::PodFlameStatus;

    #[test]
    fn test_first_sight_reconciles() {
        let pf = create_test_podflame("req1", "ns", "tp1", None);
        assert!(IgnoreStatusChange.should_reconcile(None, &pf));
    }

    #[test]
    fn test_status_only_change_ignored() {
        let old = create_test_podflame("req1", "ns", "tp1", None);
        let mut new = old.clone();
        new.status = Some(PodFlameStatus::succeeded("graph"));
        new.metadata.resource_version = Some("99".to_string());
        assert!(!IgnoreStatusChange.should_reconcile(Some(&old), &new));
    }

    #[test]
    fn test_generation_change_reconciles() {
        let old = create_test_podflame("req1", "ns", "tp1", None);
        let mut new = old.clone();
        new.metadata.generation = Some(2);
        assert!(IgnoreStatusChange.should_reconcile(Some(&old), &new));
    }

    #[test]
    fn test_metadata_change_reconciles() {
        let old = create_test_podflame("req1", "ns", "tp1", None);

        let mut labelled = old.clone();
        labelled.labels_mut().insert("team".to_string(), "perf".to_string());
        assert!(IgnoreStatusChange.should_reconcile(Some(&old), &labelled));

        let mut annotated = old.clone();
        annotated.annotations_mut().insert("note".to_string(), "x".to_string());
        assert!(IgnoreStatusChange.should_reconcile(Some(&old), &annotated));
    }

    #[test]
    fn test_recreated_object_reconciles() {
        let old = create_test_podflame("req1", "ns", "tp1", None);
        // Deleted and created again: same name, namespace, generation and metadata
        let mut recreated = old.clone();
        recreated.metadata.uid = Some("req1-uid-2".to_string());
        assert!(IgnoreStatusChange.should_reconcile(Some(&old), &recreated));
    }

    #[test]
    fn test_deletion_reconciles() {
        let old = create_test_podflame("req1", "ns", "tp1", None);
        let mut deleting = old.clone();
        deleting.metadata.deletion_timestamp =
            Some(serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap());
        assert!(IgnoreStatusChange.should_reconcile(Some(&old), &deleting));
    }
}
