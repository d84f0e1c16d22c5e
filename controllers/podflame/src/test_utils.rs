//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::config::OperatorConfig;
use crate::reconciler::Reconciler;
use cluster_client::MockClusterClient;
use crds::{PODFLAME_FINALIZER, PodFlame, PodFlameSpec, ProfilingEvent};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateRunning, ContainerStateWaiting, ContainerStatus, Pod, PodSpec,
    PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Operator namespace used by [`create_test_reconciler`]
pub const TEST_OPERATOR_NAMESPACE: &str = "ns-operator";

/// Helper to create a test PodFlame with UID `<name>-uid`
pub fn create_test_podflame(name: &str, namespace: &str, target_pod: &str, container_name: Option<&str>) -> PodFlame {
    PodFlame {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{}-uid", name)),
            generation: Some(1),
            ..Default::default()
        },
        spec: PodFlameSpec {
            target_pod: target_pod.to_string(),
            event: ProfilingEvent::Cpu,
            duration: "2m".to_string(),
            container_name: container_name.map(|s| s.to_string()),
        },
        status: None,
    }
}

/// Helper to create a scheduled target pod on `node-1` with UID `<name>-uid`.
///
/// Each container is `(name, container ID)`; a container without an ID is
/// reported as waiting rather than running.
pub fn create_test_target_pod(name: &str, namespace: &str, containers: &[(&str, Option<&str>)]) -> Pod {
    let statuses = containers
        .iter()
        .map(|(container, id)| ContainerStatus {
            name: container.to_string(),
            container_id: id.map(|s| s.to_string()),
            state: Some(match id {
                Some(_) => ContainerState {
                    running: Some(ContainerStateRunning::default()),
                    ..Default::default()
                },
                None => ContainerState {
                    waiting: Some(ContainerStateWaiting {
                        reason: Some("ContainerCreating".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            }),
            ..Default::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{}-uid", name)),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some("node-1".to_string()),
            containers: containers
                .iter()
                .map(|(container, _)| Container {
                    name: container.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            container_statuses: Some(statuses),
            ..Default::default()
        }),
    }
}

/// Helper to create a reconciler backed by `mock`, creating profiler pods in
/// [`TEST_OPERATOR_NAMESPACE`]
pub fn create_test_reconciler(mock: &MockClusterClient) -> Reconciler {
    create_test_reconciler_with(mock, |_| {})
}

/// Like [`create_test_reconciler`], with a hook to adjust the configuration
pub fn create_test_reconciler_with(mock: &MockClusterClient, adjust: impl FnOnce(&mut OperatorConfig)) -> Reconciler {
    let mut config = OperatorConfig {
        operator_namespace: TEST_OPERATOR_NAMESPACE.to_string(),
        ..OperatorConfig::default()
    };
    adjust(&mut config);
    Reconciler::new(Box::new(mock.clone()), config)
}

/// Stores a PodFlame that already carries the cleanup finalizer
pub fn add_finalized_podflame(mock: &MockClusterClient, mut podflame: PodFlame) -> PodFlame {
    podflame.metadata.finalizers = Some(vec![PODFLAME_FINALIZER.to_string()]);
    mock.add_podflame(podflame)
}
