//! Kubernetes API access for the profile pod operator
//!
//! Everything the reconciler reads from or writes to the cluster goes through
//! [`ClusterClientTrait`]. The kube-backed [`ClusterClient`] is used in
//! production; with the `test-util` feature an in-memory [`MockClusterClient`]
//! is available for unit tests.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClient, ClusterClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClusterClient::new(kube::Client::try_default().await?);
//!
//! let pod = client.get_pod("default", "web-0").await?;
//! let logs = client.read_pod_logs("default", "web-0", 4096).await?;
//! println!("{:?} {} bytes", pod.metadata.name, logs.content.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod selector;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::ClusterClient;
pub use error::ClusterError;
pub use models::*;
pub use cluster_trait::ClusterClientTrait;
pub use selector::{label_selector, selector_matches};
#[cfg(feature = "test-util")]
pub use mock::{MockClusterClient, Operation, InjectedFailure};
