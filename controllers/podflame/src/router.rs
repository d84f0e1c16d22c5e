//! Routing of child pod events back to their PodFlame.
//!
//! Profiler pods live in the operator namespace, so there is no owner
//! reference to follow. Instead each pod carries the owner's name and
//! namespace as annotations; a pod missing either one is not ours.

use crds::{ANNOTATION_NAME, ANNOTATION_NAMESPACE, PodFlame};
use k8s_openapi::api::core::v1::Pod;
use kube_runtime::reflector::ObjectRef;
use std::collections::BTreeMap;

/// Maps a profiler pod to the PodFlame that owns it
pub fn podflame_for_pod(pod: Pod) -> Option<ObjectRef<PodFlame>> {
    owner_from_annotations(pod.metadata.annotations.as_ref()?)
}

/// Decodes the owner identity markers
pub fn owner_from_annotations(annotations: &BTreeMap<String, String>) -> Option<ObjectRef<PodFlame>> {
    let name = annotations.get(ANNOTATION_NAME)?;
    let namespace = annotations.get(ANNOTATION_NAMESPACE)?;
    Some(ObjectRef::new(name).within(namespace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod_with(annotations: Option<&[(&str, &str)]>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("ns-req1".to_string()),
                namespace: Some("ns-operator".to_string()),
                annotations: annotations.map(|pairs| {
                    pairs
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                }),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[test]
    fn test_routes_to_owner() {
        let pod = pod_with(Some(&[(ANNOTATION_NAME, "req1"), (ANNOTATION_NAMESPACE, "ns")]));
        let owner = podflame_for_pod(pod).unwrap();
        assert_eq!(owner.name, "req1");
        assert_eq!(owner.namespace.as_deref(), Some("ns"));
    }

    #[test]
    fn test_partial_markers_are_ignored() {
        assert!(podflame_for_pod(pod_with(Some(&[(ANNOTATION_NAME, "req1")]))).is_none());
        assert!(podflame_for_pod(pod_with(Some(&[(ANNOTATION_NAMESPACE, "ns")]))).is_none());
        assert!(podflame_for_pod(pod_with(Some(&[]))).is_none());
        assert!(podflame_for_pod(pod_with(None)).is_none());
    }
}
