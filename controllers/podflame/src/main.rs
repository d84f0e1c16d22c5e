//! PodFlame Controller
//!
//! Runs on-demand CPU profiling sessions against running containers.
//!
//! For each `PodFlame` the controller starts a privileged profiler pod on the
//! target's node, waits for it to finish, copies its output onto the
//! PodFlame status and removes the pod again.

mod config;
mod controller;
mod error;
mod pod_builder;
mod predicate;
mod reconciler;
mod router;
mod runtime;
mod target;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // kube's rustls transport needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting PodFlame Controller");

    // Load configuration from environment variables
    let config = OperatorConfig::from_env()?;

    info!("Configuration:");
    info!("  Operator namespace: {}", config.operator_namespace);
    info!("  Agent image: {}", config.agent_image);
    info!(
        "  Watch namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Log limit: {} bytes", config.log_limit_bytes);
    info!("  Error requeue: {:?}", config.error_requeue);
    info!("  Concurrency: {}", config.concurrency);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
