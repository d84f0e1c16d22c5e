//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the object changed since it was read
    /// (or, on create, because it already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection or stream failure
    #[error("Transport failure: {0}")]
    Transport(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
}

impl ClusterError {
    /// Whether the error means the object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    /// Whether the error is an optimistic-concurrency rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(e: kube::Error) -> Self {
        match &e {
            kube::Error::Api(response) if response.code == 404 => {
                ClusterError::NotFound(response.message.clone())
            }
            kube::Error::Api(response) if response.code == 409 => {
                ClusterError::Conflict(response.message.clone())
            }
            _ => ClusterError::Kube(e),
        }
    }
}
