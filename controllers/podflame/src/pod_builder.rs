//! Profiler pod definition.
//!
//! Pure transform from a PodFlame and its resolved target to the child pod
//! that runs the profiling agent. Identical inputs always produce an
//! identical pod.

use crate::error::ControllerError;
use crate::target::ResolvedTarget;
use crds::{ANNOTATION_NAME, ANNOTATION_NAMESPACE, ANNOTATION_SIDECAR_INJECT, PodFlame};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, HostPathVolumeSource, Pod, PodSpec, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Name of the agent container inside the profiler pod
pub const PROFILER_CONTAINER_NAME: &str = "pod-profiler";

/// Entrypoint of the agent image
pub const AGENT_COMMAND: &str = "/app/agent";

const RUNTIME_VOLUME: &str = "runtime-path";
const RUNTIME_MOUNT_PATH: &str = "/runtimepath";

/// Name of the (single) profiler pod of a PodFlame: `<namespace>-<name>`
pub fn profiler_pod_name(podflame: &PodFlame) -> String {
    format!(
        "{}-{}",
        podflame.namespace().unwrap_or_else(|| "default".to_string()),
        podflame.name_any()
    )
}

/// Positional agent arguments:
/// `[target pod UID, container name, container ID, runtime, duration, event]`
pub fn agent_args(podflame: &PodFlame, target: &ResolvedTarget) -> Vec<String> {
    vec![
        target.pod_uid.clone(),
        target.container_name.clone(),
        target.container_id.clone(),
        target.runtime.clone(),
        podflame.spec.duration.clone(),
        podflame.spec.event.to_string(),
    ]
}

/// Builds the profiler pod for `podflame`.
///
/// The pod is pinned to the target's node, shares the host PID namespace,
/// runs with every capability and mounts the runtime state directory at
/// `host_path`. It is placed in `namespace` (the operator namespace) and
/// carries the owner's identity as annotations and labels.
pub fn build_profiler_pod(
    podflame: &PodFlame,
    target: &ResolvedTarget,
    host_path: &str,
    namespace: &str,
    agent_image: &str,
) -> Result<Pod, ControllerError> {
    let labels = podflame.owner_labels().ok_or_else(|| {
        ControllerError::MissingField(format!("metadata.uid of PodFlame {}", podflame.name_any()))
    })?;
    let annotations = BTreeMap::from([
        (ANNOTATION_SIDECAR_INJECT.to_string(), "false".to_string()),
        (ANNOTATION_NAME.to_string(), podflame.name_any()),
        (
            ANNOTATION_NAMESPACE.to_string(),
            podflame.namespace().unwrap_or_else(|| "default".to_string()),
        ),
    ]);

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(profiler_pod_name(podflame)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            host_pid: Some(true),
            restart_policy: Some("Never".to_string()),
            node_name: Some(target.node_name.clone()),
            volumes: Some(vec![Volume {
                name: RUNTIME_VOLUME.to_string(),
                host_path: Some(HostPathVolumeSource {
                    path: host_path.to_string(),
                    ..HostPathVolumeSource::default()
                }),
                ..Volume::default()
            }]),
            containers: vec![Container {
                name: PROFILER_CONTAINER_NAME.to_string(),
                image: Some(agent_image.to_string()),
                image_pull_policy: Some("IfNotPresent".to_string()),
                command: Some(vec![AGENT_COMMAND.to_string()]),
                args: Some(agent_args(podflame, target)),
                volume_mounts: Some(vec![VolumeMount {
                    name: RUNTIME_VOLUME.to_string(),
                    mount_path: RUNTIME_MOUNT_PATH.to_string(),
                    ..VolumeMount::default()
                }]),
                security_context: Some(SecurityContext {
                    capabilities: Some(Capabilities {
                        add: Some(vec!["ALL".to_string()]),
                        ..Capabilities::default()
                    }),
                    ..SecurityContext::default()
                }),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        status: None,
    })
}
