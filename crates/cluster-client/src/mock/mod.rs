//! Mock ClusterClient for unit testing
//!
//! In-memory stand-in for the Kubernetes API. It mimics the server behaviour
//! the reconciler depends on: resourceVersion preconditions on writes,
//! finalizer-gated deletion of PodFlames, and (optionally) pods that linger in
//! a terminating state after a delete request.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crate::models::{PodLogs, ProfilerEvent};
use crate::selector::selector_matches;
use crds::{PodFlame, PodFlameStatus};
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// Client operation, used to target failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetPodFlame,
    PatchFinalizers,
    PatchStatus,
    PublishEvent,
    GetPod,
    CreatePod,
    DeletePod,
    ListPods,
    DeletePods,
    ReadLogs,
}

/// Failure returned by the next call of an [`Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Conflict,
    Transport,
}

impl InjectedFailure {
    fn into_error(self, op: Operation) -> ClusterError {
        match self {
            InjectedFailure::Conflict => ClusterError::Conflict(format!("injected conflict on {:?}", op)),
            InjectedFailure::Transport => {
                ClusterError::Transport(format!("injected transport failure on {:?}", op))
            }
        }
    }
}

/// Mock ClusterClient for testing
///
/// Clones share the same store, so a test can keep a handle for setup and
/// assertions while the reconciler owns another.
#[derive(Clone, Default)]
pub struct MockClusterClient {
    podflames: Arc<Mutex<HashMap<Key, PodFlame>>>,
    pods: Arc<Mutex<HashMap<Key, Pod>>>,
    logs: Arc<Mutex<HashMap<Key, Vec<u8>>>>,
    events: Arc<Mutex<Vec<(Key, ProfilerEvent)>>>,
    failures: Arc<Mutex<HashMap<Operation, InjectedFailure>>>,
    created_pods: Arc<Mutex<Vec<Pod>>>,
    deleted_pods: Arc<Mutex<Vec<Key>>>,
    status_writes: Arc<Mutex<Vec<(Key, PodFlameStatus)>>>,
    retain_deleted_pods: Arc<Mutex<bool>>,
    // Counter for generating resource versions
    next_resource_version: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClusterClient").finish_non_exhaustive()
    }
}

impl MockClusterClient {
    /// Create a new, empty mock cluster
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_resource_version(&self) -> String {
        let mut rv = self.next_resource_version.lock().unwrap();
        *rv += 1;
        rv.to_string()
    }

    fn take_failure(&self, op: Operation) -> Result<(), ClusterError> {
        match self.failures.lock().unwrap().remove(&op) {
            Some(failure) => Err(failure.into_error(op)),
            None => Ok(()),
        }
    }

    fn deletion_timestamp() -> Time {
        serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z"))
            .expect("static timestamp is valid RFC 3339")
    }

    /// Makes the next call of `op` fail (one-shot)
    pub fn fail_next(&self, op: Operation, failure: InjectedFailure) {
        self.failures.lock().unwrap().insert(op, failure);
    }

    /// When set, deleted pods stay visible as terminating until
    /// [`finish_pod_deletions`](Self::finish_pod_deletions) is called
    pub fn set_retain_deleted_pods(&self, retain: bool) {
        *self.retain_deleted_pods.lock().unwrap() = retain;
    }

    /// Removes every pod marked for deletion
    pub fn finish_pod_deletions(&self) {
        self.pods
            .lock()
            .unwrap()
            .retain(|_, pod| pod.metadata.deletion_timestamp.is_none());
    }

    // PodFlame setup / inspection

    /// Stores a PodFlame, filling in the server-assigned metadata (for test setup)
    pub fn add_podflame(&self, mut podflame: PodFlame) -> PodFlame {
        let namespace = podflame.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = podflame.metadata.name.clone().unwrap_or_default();
        podflame.metadata.namespace = Some(namespace.clone());
        if podflame.metadata.uid.is_none() {
            podflame.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        podflame.metadata.generation = Some(podflame.metadata.generation.unwrap_or(1));
        podflame.metadata.resource_version = Some(self.bump_resource_version());
        self.podflames
            .lock()
            .unwrap()
            .insert(key(&namespace, &name), podflame.clone());
        podflame
    }

    /// Current stored PodFlame
    pub fn podflame(&self, namespace: &str, name: &str) -> Option<PodFlame> {
        self.podflames.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Simulates an out-of-band write to a PodFlame (bumps its resourceVersion)
    pub fn touch_podflame(&self, namespace: &str, name: &str) {
        let rv = self.bump_resource_version();
        if let Some(pf) = self.podflames.lock().unwrap().get_mut(&key(namespace, name)) {
            pf.metadata.resource_version = Some(rv);
        }
    }

    /// Simulates `kubectl delete`: sets the deletion timestamp, or removes the
    /// object straight away when no finalizers are present
    pub fn request_podflame_deletion(&self, namespace: &str, name: &str) {
        let rv = self.bump_resource_version();
        let mut podflames = self.podflames.lock().unwrap();
        let k = key(namespace, name);
        let Some(pf) = podflames.get_mut(&k) else {
            return;
        };
        if pf.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            podflames.remove(&k);
            return;
        }
        pf.metadata.deletion_timestamp = Some(Self::deletion_timestamp());
        pf.metadata.resource_version = Some(rv);
    }

    /// Every status written so far, in order
    pub fn status_writes(&self) -> Vec<(Key, PodFlameStatus)> {
        self.status_writes.lock().unwrap().clone()
    }

    /// Every event published so far, in order
    pub fn events(&self) -> Vec<(Key, ProfilerEvent)> {
        self.events.lock().unwrap().clone()
    }

    // Pod setup / inspection

    /// Stores a pod as-is, filling in namespace and UID (for test setup)
    pub fn add_pod(&self, mut pod: Pod) -> Pod {
        let namespace = pod.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = pod.metadata.name.clone().unwrap_or_default();
        pod.metadata.namespace = Some(namespace.clone());
        if pod.metadata.uid.is_none() {
            pod.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        pod.metadata.resource_version = Some(self.bump_resource_version());
        self.pods.lock().unwrap().insert(key(&namespace, &name), pod.clone());
        pod
    }

    /// Current stored pod
    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Pods currently stored in `namespace`
    pub fn pods_in(&self, namespace: &str) -> Vec<Pod> {
        self.pods
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, pod)| pod.clone())
            .collect()
    }

    /// Sets `status.phase` of a stored pod
    pub fn set_pod_phase(&self, namespace: &str, name: &str, phase: &str) {
        if let Some(pod) = self.pods.lock().unwrap().get_mut(&key(namespace, name)) {
            pod.status.get_or_insert_with(PodStatus::default).phase = Some(phase.to_string());
        }
    }

    /// Sets the raw log output returned for a pod
    pub fn set_pod_logs(&self, namespace: &str, name: &str, logs: impl Into<Vec<u8>>) {
        self.logs.lock().unwrap().insert(key(namespace, name), logs.into());
    }

    /// Every pod created through the client, in order
    pub fn created_pods(&self) -> Vec<Pod> {
        self.created_pods.lock().unwrap().clone()
    }

    /// Every single-pod delete issued through the client, in order
    pub fn deleted_pods(&self) -> Vec<Key> {
        self.deleted_pods.lock().unwrap().clone()
    }

    fn remove_or_mark(&self, pods: &mut HashMap<Key, Pod>, k: &Key) {
        if *self.retain_deleted_pods.lock().unwrap() {
            if let Some(pod) = pods.get_mut(k) {
                pod.metadata.deletion_timestamp = Some(Self::deletion_timestamp());
            }
        } else {
            pods.remove(k);
        }
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_podflame(&self, namespace: &str, name: &str) -> Result<PodFlame, ClusterError> {
        self.take_failure(Operation::GetPodFlame)?;
        self.podflame(namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("podflames \"{}\" not found", name)))
    }

    async fn patch_podflame_finalizers(
        &self,
        podflame: &PodFlame,
        finalizers: Vec<String>,
    ) -> Result<PodFlame, ClusterError> {
        self.take_failure(Operation::PatchFinalizers)?;
        let rv = self.bump_resource_version();
        let mut podflames = self.podflames.lock().unwrap();
        let k = key(
            podflame.metadata.namespace.as_deref().unwrap_or("default"),
            podflame.metadata.name.as_deref().unwrap_or_default(),
        );
        let stored = podflames
            .get_mut(&k)
            .ok_or_else(|| ClusterError::NotFound(format!("podflames \"{}\" not found", k.1)))?;
        if stored.metadata.resource_version != podflame.metadata.resource_version {
            return Err(ClusterError::Conflict(format!(
                "Operation cannot be fulfilled on podflames \"{}\": the object has been modified",
                k.1
            )));
        }
        stored.metadata.finalizers = Some(finalizers);
        stored.metadata.resource_version = Some(rv);
        let updated = stored.clone();

        // Store finishes a pending deletion once the last finalizer is gone
        if updated.metadata.deletion_timestamp.is_some()
            && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty)
        {
            podflames.remove(&k);
        }
        Ok(updated)
    }

    async fn patch_podflame_status(
        &self,
        podflame: &PodFlame,
        status: &PodFlameStatus,
    ) -> Result<PodFlame, ClusterError> {
        self.take_failure(Operation::PatchStatus)?;
        let rv = self.bump_resource_version();
        let mut podflames = self.podflames.lock().unwrap();
        let k = key(
            podflame.metadata.namespace.as_deref().unwrap_or("default"),
            podflame.metadata.name.as_deref().unwrap_or_default(),
        );
        let stored = podflames
            .get_mut(&k)
            .ok_or_else(|| ClusterError::NotFound(format!("podflames \"{}\" not found", k.1)))?;
        if stored.metadata.resource_version != podflame.metadata.resource_version {
            return Err(ClusterError::Conflict(format!(
                "Operation cannot be fulfilled on podflames \"{}\": the object has been modified",
                k.1
            )));
        }
        // Merge patch: only fields present in the patch are written
        let current = stored.status.get_or_insert_with(PodFlameStatus::default);
        if status.flame_graph.is_some() {
            current.flame_graph = status.flame_graph.clone();
        }
        if status.failed.is_some() {
            current.failed = status.failed.clone();
        }
        stored.metadata.resource_version = Some(rv);
        self.status_writes.lock().unwrap().push((k, status.clone()));
        Ok(stored.clone())
    }

    async fn publish_event(&self, podflame: &PodFlame, event: ProfilerEvent) -> Result<(), ClusterError> {
        self.take_failure(Operation::PublishEvent)?;
        let k = key(
            podflame.metadata.namespace.as_deref().unwrap_or("default"),
            podflame.metadata.name.as_deref().unwrap_or_default(),
        );
        self.events.lock().unwrap().push((k, event));
        Ok(())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        self.take_failure(Operation::GetPod)?;
        self.pod(namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("pods \"{}\" not found", name)))
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        self.take_failure(Operation::CreatePod)?;
        let name = pod.metadata.name.clone().unwrap_or_default();
        let k = key(namespace, &name);
        if self.pods.lock().unwrap().contains_key(&k) {
            return Err(ClusterError::Conflict(format!("pods \"{}\" already exists", name)));
        }
        let mut created = pod.clone();
        created.metadata = ObjectMeta {
            namespace: Some(namespace.to_string()),
            uid: Some(uuid::Uuid::new_v4().to_string()),
            resource_version: Some(self.bump_resource_version()),
            ..pod.metadata.clone()
        };
        created.status = Some(PodStatus {
            phase: Some("Pending".to_string()),
            ..PodStatus::default()
        });
        self.pods.lock().unwrap().insert(k, created.clone());
        self.created_pods.lock().unwrap().push(pod.clone());
        Ok(created)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.take_failure(Operation::DeletePod)?;
        let k = key(namespace, name);
        let mut pods = self.pods.lock().unwrap();
        if !pods.contains_key(&k) {
            return Err(ClusterError::NotFound(format!("pods \"{}\" not found", name)));
        }
        self.remove_or_mark(&mut pods, &k);
        self.deleted_pods.lock().unwrap().push(k);
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClusterError> {
        self.take_failure(Operation::ListPods)?;
        Ok(self
            .pods_in(namespace)
            .into_iter()
            .filter(|pod| selector_matches(selector, pod.metadata.labels.as_ref()))
            .collect())
    }

    async fn delete_pods(&self, namespace: &str, selector: &str) -> Result<(), ClusterError> {
        self.take_failure(Operation::DeletePods)?;
        let mut pods = self.pods.lock().unwrap();
        let matching: Vec<Key> = pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && selector_matches(selector, pod.metadata.labels.as_ref()))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &matching {
            self.remove_or_mark(&mut pods, k);
        }
        Ok(())
    }

    async fn read_pod_logs(
        &self,
        namespace: &str,
        name: &str,
        limit_bytes: usize,
    ) -> Result<PodLogs, ClusterError> {
        self.take_failure(Operation::ReadLogs)?;
        if self.pod(namespace, name).is_none() {
            return Err(ClusterError::NotFound(format!("pods \"{}\" not found", name)));
        }
        let raw = self
            .logs
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .unwrap_or_default();
        Ok(PodLogs::bounded(raw, limit_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{PodFlameSpec, ProfilingEvent, PODFLAME_FINALIZER};

    fn podflame(name: &str) -> PodFlame {
        let mut pf = PodFlame::new(
            name,
            PodFlameSpec {
                target_pod: "tp1".to_string(),
                event: ProfilingEvent::Cpu,
                duration: "2m".to_string(),
                container_name: None,
            },
        );
        pf.metadata.namespace = Some("ns".to_string());
        pf
    }

    #[tokio::test]
    async fn test_stale_status_write_conflicts() {
        let mock = MockClusterClient::new();
        let stored = mock.add_podflame(podflame("req1"));
        mock.touch_podflame("ns", "req1");

        let result = mock
            .patch_podflame_status(&stored, &PodFlameStatus::succeeded("graph"))
            .await;
        assert!(result.unwrap_err().is_conflict());
        assert!(mock.status_writes().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_completes_when_finalizer_removed() {
        let mock = MockClusterClient::new();
        let stored = mock.add_podflame(podflame("req1"));
        let stored = mock
            .patch_podflame_finalizers(&stored, vec![PODFLAME_FINALIZER.to_string()])
            .await
            .unwrap();

        mock.request_podflame_deletion("ns", "req1");
        assert!(mock.podflame("ns", "req1").unwrap().metadata.deletion_timestamp.is_some());

        // Stale copy is rejected
        assert!(mock.patch_podflame_finalizers(&stored, vec![]).await.unwrap_err().is_conflict());

        let current = mock.podflame("ns", "req1").unwrap();
        mock.patch_podflame_finalizers(&current, vec![]).await.unwrap();
        assert!(mock.podflame("ns", "req1").is_none());
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let mock = MockClusterClient::new();
        mock.fail_next(Operation::GetPod, InjectedFailure::Transport);
        mock.add_pod(Pod {
            metadata: ObjectMeta {
                name: Some("tp1".to_string()),
                namespace: Some("ns".to_string()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        });

        assert!(matches!(mock.get_pod("ns", "tp1").await, Err(ClusterError::Transport(_))));
        assert!(mock.get_pod("ns", "tp1").await.is_ok());
    }
}
