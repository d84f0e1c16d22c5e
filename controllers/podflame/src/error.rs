//! Controller-specific error types.
//!
//! This module defines error types specific to the PodFlame Controller
//! that are not covered by upstream library errors.

use cluster_client::ClusterError;
use thiserror::Error;

/// Errors that can occur in the PodFlame Controller.
///
/// Every variant aborts the current pass; the error policy re-runs the whole
/// pass later. None of them is fatal to the controller as a whole.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error (not found, write conflict, transport)
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Target pod runs several containers and none matches `spec.containerName`
    #[error("Could not determine container in pod {pod}, please specify one of {candidates:?}")]
    AmbiguousContainer { pod: String, candidates: Vec<String> },

    /// Target container has no running state
    #[error("Container is not running: {0}")]
    ContainerNotRunning(String),

    /// Target pod has no status entry for the container
    #[error("Could not find container status for {0}")]
    ContainerStatusMissing(String),

    /// Container runtime has no known state directory
    #[error("Unsupported container runtime: {0}")]
    UnsupportedRuntime(String),

    /// Container ID did not have the `<runtime>://<id>` shape
    #[error("Malformed container ID: {0}")]
    MalformedContainerId(String),

    /// Object lacks a field the API server always sets
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Refused to overwrite a terminal status
    #[error("Status of {0} is already terminal")]
    StatusAlreadyTerminal(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether the pass lost an optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, ControllerError::Cluster(e) if e.is_conflict())
    }
}
