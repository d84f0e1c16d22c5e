//! Deletion protocol.
//!
//! The cleanup finalizer keeps a PodFlame around until every profiler pod it
//! owns is gone from the operator namespace. Child pods are found by owner
//! labels rather than by name, so pods left behind by earlier runs are
//! removed as well.

use super::{ReconcileOutcome, Reconciler};
use crate::error::ControllerError;
use cluster_client::{ProfilerEvent, label_selector};
use crds::{PODFLAME_FINALIZER, PodFlame};
use kube::ResourceExt;
use tracing::{debug, info};

impl Reconciler {
    pub(super) async fn add_finalizer(&self, podflame: &PodFlame) -> Result<ReconcileOutcome, ControllerError> {
        self.client
            .patch_podflame_finalizers(podflame, podflame.finalizers_with_cleanup())
            .await?;
        debug!(
            "Added finalizer {} to PodFlame {}/{}",
            PODFLAME_FINALIZER,
            podflame.namespace().unwrap_or_default(),
            podflame.name_any()
        );
        Ok(ReconcileOutcome::FinalizerAdded)
    }

    /// Deletes the children, then releases the finalizer once none remain
    pub(super) async fn finalize(&self, podflame: &PodFlame) -> Result<ReconcileOutcome, ControllerError> {
        let name = podflame.name_any();
        let namespace = podflame.namespace().unwrap_or_default();
        let labels = podflame
            .owner_labels()
            .ok_or_else(|| ControllerError::MissingField(format!("metadata.uid of PodFlame {}", name)))?;
        let selector = label_selector(&labels);
        let operator_namespace = self.config.operator_namespace.as_str();

        self.client.delete_pods(operator_namespace, &selector).await?;

        let remaining = self.client.list_pods(operator_namespace, &selector).await?;
        if !remaining.is_empty() {
            info!(
                "Waiting for {} profiler pod(s) of PodFlame {}/{} to terminate",
                remaining.len(),
                namespace,
                name
            );
            return Ok(ReconcileOutcome::AwaitingCleanup {
                remaining: remaining.len(),
            });
        }

        self.client
            .publish_event(
                podflame,
                ProfilerEvent::warning(
                    "Deleting",
                    "Finalize",
                    format!(
                        "Custom Resource {} is being deleted from the namespace {}",
                        name, namespace
                    ),
                ),
            )
            .await?;

        match self
            .client
            .patch_podflame_finalizers(podflame, podflame.finalizers_without_cleanup())
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => debug!("PodFlame {}/{} already removed", namespace, name),
            Err(e) => return Err(e.into()),
        }
        info!("Finalized PodFlame {}/{}", namespace, name);
        Ok(ReconcileOutcome::Finalized)
    }
}
