//! ClusterClient trait for mocking
//!
//! This trait abstracts every Kubernetes API call the reconciler makes so the
//! state machine can be unit tested against an in-memory store.
//! The kube-backed ClusterClient implements this trait.

use crate::error::ClusterError;
use crate::models::{PodLogs, ProfilerEvent};
use crds::{PodFlame, PodFlameStatus};
use k8s_openapi::api::core::v1::Pod;

/// Trait for Kubernetes API operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    // PodFlame operations

    /// Live read of a PodFlame
    async fn get_podflame(&self, namespace: &str, name: &str) -> Result<PodFlame, ClusterError>;

    /// Replaces the finalizer list, conditional on `podflame`'s resourceVersion
    async fn patch_podflame_finalizers(
        &self,
        podflame: &PodFlame,
        finalizers: Vec<String>,
    ) -> Result<PodFlame, ClusterError>;

    /// Writes the status subresource, conditional on `podflame`'s resourceVersion
    async fn patch_podflame_status(
        &self,
        podflame: &PodFlame,
        status: &PodFlameStatus,
    ) -> Result<PodFlame, ClusterError>;

    /// Publishes a user-visible event about `podflame`
    async fn publish_event(&self, podflame: &PodFlame, event: ProfilerEvent) -> Result<(), ClusterError>;

    // Pod operations
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError>;
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClusterError>;
    async fn delete_pods(&self, namespace: &str, selector: &str) -> Result<(), ClusterError>;

    /// Reads a pod's log stream to the end, keeping at most `limit_bytes`
    async fn read_pod_logs(
        &self,
        namespace: &str,
        name: &str,
        limit_bytes: usize,
    ) -> Result<PodLogs, ClusterError>;
}
