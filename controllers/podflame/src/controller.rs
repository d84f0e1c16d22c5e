//! Main controller implementation.
//!
//! This module contains the `Controller` struct that orchestrates
//! reconciliation and resource watching for the PodFlame Controller.

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::predicate::IgnoreStatusChange;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_client::{ClusterClient, ClusterError};
use crds::PodFlame;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for PodFlame profiling sessions.
pub struct Controller {
    podflame_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing PodFlame Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await.map_err(ClusterError::from)?;

        // PodFlames in one namespace or cluster-wide; profiler pods always in
        // the operator namespace
        let podflame_api: Api<PodFlame> = match config.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };
        let pod_api: Api<Pod> = Api::namespaced(kube_client.clone(), &config.operator_namespace);

        let reconciler = Arc::new(Reconciler::new(
            Box::new(ClusterClient::new(kube_client)),
            config,
        ));

        let watcher = Watcher::new(reconciler, podflame_api, pod_api, Arc::new(IgnoreStatusChange));
        let podflame_watcher = tokio::spawn(async move { watcher.watch_podflames().await });

        Ok(Self { podflame_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("PodFlame Controller running");

        self.podflame_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("PodFlame watcher panicked: {}", e)))??;

        info!("PodFlame Controller stopped");
        Ok(())
    }
}
