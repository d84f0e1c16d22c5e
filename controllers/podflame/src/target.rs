//! Target resolution.
//!
//! Finds the live pod a PodFlame points at, picks the container to profile and
//! reads the runtime name and container ID from the container's status.

use crate::error::ControllerError;
use cluster_client::ClusterClientTrait;
use crds::PodFlame;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tracing::debug;

/// Everything the child pod builder needs to know about the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub pod_name: String,
    pub pod_uid: String,
    /// Node the target runs on; the profiler must run there too
    pub node_name: String,
    pub container_name: String,
    /// Runtime name, e.g. `containerd`
    pub runtime: String,
    /// Runtime-assigned container ID
    pub container_id: String,
}

/// Reads the target pod of `podflame` and resolves the container to profile
pub async fn resolve_target(
    client: &dyn ClusterClientTrait,
    podflame: &PodFlame,
) -> Result<ResolvedTarget, ControllerError> {
    let namespace = podflame.namespace().unwrap_or_else(|| "default".to_string());
    let pod = client.get_pod(&namespace, &podflame.spec.target_pod).await?;
    debug!("Resolving target container in pod {}/{}", namespace, podflame.spec.target_pod);
    resolve_in_pod(&pod, podflame.spec.container_name.as_deref())
}

/// Resolves the container to profile within an already-fetched pod
pub fn resolve_in_pod(pod: &Pod, container_hint: Option<&str>) -> Result<ResolvedTarget, ControllerError> {
    let container_name = select_container(pod, container_hint)?;
    let (runtime, container_id) = container_runtime(pod, &container_name)?;

    let pod_name = pod.name_any();
    let pod_uid = pod
        .uid()
        .ok_or_else(|| ControllerError::MissingField(format!("metadata.uid of pod {}", pod_name)))?;
    let node_name = pod
        .spec
        .as_ref()
        .and_then(|s| s.node_name.clone())
        .ok_or_else(|| ControllerError::MissingField(format!("spec.nodeName of pod {}", pod_name)))?;

    Ok(ResolvedTarget {
        pod_name,
        pod_uid,
        node_name,
        container_name,
        runtime,
        container_id,
    })
}

/// Picks the container to profile.
///
/// A single-container pod needs no hint (and ignores one). Otherwise the hint
/// must name one of the pod's containers.
pub fn select_container(pod: &Pod, hint: Option<&str>) -> Result<String, ControllerError> {
    let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();

    if let [only] = containers {
        return Ok(only.name.clone());
    }
    if let Some(found) = hint.and_then(|h| containers.iter().find(|c| c.name == h)) {
        return Ok(found.name.clone());
    }
    Err(ControllerError::AmbiguousContainer {
        pod: pod.name_any(),
        candidates: containers.iter().map(|c| c.name.clone()).collect(),
    })
}

/// Reads `(runtime, container ID)` of a running container from the pod status
pub fn container_runtime(pod: &Pod, container_name: &str) -> Result<(String, String), ControllerError> {
    let status = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.iter().find(|s| s.name == container_name))
        .ok_or_else(|| ControllerError::ContainerStatusMissing(container_name.to_string()))?;

    let running = status.state.as_ref().and_then(|s| s.running.as_ref()).is_some();
    if !running {
        return Err(ControllerError::ContainerNotRunning(container_name.to_string()));
    }

    let raw = status.container_id.as_deref().unwrap_or_default();
    parse_container_id(raw)
}

/// Splits a `<runtime>://<id>` container ID
pub fn parse_container_id(raw: &str) -> Result<(String, String), ControllerError> {
    match raw.split_once("://") {
        Some((runtime, id))
            if !runtime.is_empty() && !runtime.contains(':') && !id.is_empty() && !id.contains('/') =>
        {
            Ok((runtime.to_string(), id.to_string()))
        }
        _ => Err(ControllerError::MalformedContainerId(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_parse_container_id() {
        assert_eq!(
            parse_container_id("containerd://abc123").unwrap(),
            ("containerd".to_string(), "abc123".to_string())
        );
        assert_eq!(
            parse_container_id("docker://0f1e2d").unwrap(),
            ("docker".to_string(), "0f1e2d".to_string())
        );
        for bad in ["", "abc123", "containerd://", "://abc", "containerd://a/b", "a:b://c"] {
            assert!(
                matches!(parse_container_id(bad), Err(ControllerError::MalformedContainerId(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_single_container_ignores_hint() {
        let pod = create_test_target_pod("tp1", "ns", &[("app", Some("containerd://abc123"))]);

        assert_eq!(select_container(&pod, None).unwrap(), "app");
        assert_eq!(select_container(&pod, Some("other")).unwrap(), "app");
    }

    #[test]
    fn test_hint_selects_among_several() {
        let pod = create_test_target_pod(
            "tp1",
            "ns",
            &[("a", Some("docker://aaa")), ("b", Some("containerd://bbb"))],
        );

        let target = resolve_in_pod(&pod, Some("b")).unwrap();
        assert_eq!(target.container_name, "b");
        assert_eq!(target.runtime, "containerd");
        assert_eq!(target.container_id, "bbb");
        assert_eq!(target.node_name, "node-1");
    }

    #[test]
    fn test_unmatched_hint_is_ambiguous() {
        let pod = create_test_target_pod(
            "tp1",
            "ns",
            &[("a", Some("docker://aaa")), ("b", Some("docker://bbb"))],
        );

        for hint in [Some("c"), None] {
            match resolve_in_pod(&pod, hint) {
                Err(ControllerError::AmbiguousContainer { pod, candidates }) => {
                    assert_eq!(pod, "tp1");
                    assert_eq!(candidates, vec!["a", "b"]);
                }
                other => panic!("expected AmbiguousContainer, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_container_not_running() {
        let pod = create_test_target_pod("tp1", "ns", &[("app", None)]);
        assert!(matches!(
            resolve_in_pod(&pod, None),
            Err(ControllerError::ContainerNotRunning(ref c)) if c == "app"
        ));
    }

    #[test]
    fn test_missing_container_status() {
        let mut pod = create_test_target_pod("tp1", "ns", &[("app", Some("containerd://abc"))]);
        pod.status = None;
        assert!(matches!(
            resolve_in_pod(&pod, None),
            Err(ControllerError::ContainerStatusMissing(_))
        ));
    }

    #[test]
    fn test_unscheduled_pod_has_no_node() {
        let mut pod = create_test_target_pod("tp1", "ns", &[("app", Some("containerd://abc"))]);
        pod.spec.as_mut().unwrap().node_name = None;
        assert!(matches!(resolve_in_pod(&pod, None), Err(ControllerError::MissingField(_))));
    }

    #[tokio::test]
    async fn test_resolve_target_reads_pod_from_podflame_namespace() {
        let mock = cluster_client::MockClusterClient::new();
        mock.add_pod(create_test_target_pod("tp1", "ns", &[("app", Some("containerd://abc123"))]));
        let podflame = create_test_podflame("req1", "ns", "tp1", None);

        let target = resolve_target(&mock, &podflame).await.unwrap();
        assert_eq!(target.pod_name, "tp1");
        assert_eq!(target.container_id, "abc123");

        let elsewhere = create_test_podflame("req1", "other", "tp1", None);
        let err = resolve_target(&mock, &elsewhere).await.unwrap_err();
        assert!(matches!(err, ControllerError::Cluster(ref e) if e.is_not_found()));
    }
}
