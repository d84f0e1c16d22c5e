//! Kube-backed cluster client

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crate::models::{EventSeverity, PodLogs, ProfilerEvent};
use crds::{OPERATOR_NAME, PodFlame, PodFlameStatus};
use futures::AsyncReadExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Cluster client backed by a kube [`Client`]
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    recorder: Recorder,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient").finish_non_exhaustive()
    }
}

impl ClusterClient {
    /// Creates a client that reports events as the operator
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: OPERATOR_NAME.to_string(),
            instance: std::env::var("HOSTNAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    fn podflames(&self, namespace: &str) -> Api<PodFlame> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Splits a PodFlame into the (namespace, name) pair used to address it
fn identity(podflame: &PodFlame) -> (String, String) {
    (
        podflame.namespace().unwrap_or_else(|| "default".to_string()),
        podflame.name_any(),
    )
}

/// Merge patch body guarded by the object's resourceVersion.
///
/// The API server rejects the patch with 409 if the object has been written
/// since `podflame` was read.
fn guarded_patch(podflame: &PodFlame, body: serde_json::Value) -> serde_json::Value {
    let mut patch = body;
    if let Some(rv) = podflame.resource_version() {
        patch["metadata"]["resourceVersion"] = json!(rv);
    }
    patch
}

#[async_trait::async_trait]
impl ClusterClientTrait for ClusterClient {
    async fn get_podflame(&self, namespace: &str, name: &str) -> Result<PodFlame, ClusterError> {
        Ok(self.podflames(namespace).get(name).await?)
    }

    async fn patch_podflame_finalizers(
        &self,
        podflame: &PodFlame,
        finalizers: Vec<String>,
    ) -> Result<PodFlame, ClusterError> {
        let (namespace, name) = identity(podflame);
        let patch = guarded_patch(podflame, json!({ "metadata": { "finalizers": finalizers } }));
        debug!("Patching finalizers of PodFlame {}/{}", namespace, name);
        Ok(self
            .podflames(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn patch_podflame_status(
        &self,
        podflame: &PodFlame,
        status: &PodFlameStatus,
    ) -> Result<PodFlame, ClusterError> {
        let (namespace, name) = identity(podflame);
        let patch = guarded_patch(podflame, json!({ "status": serde_json::to_value(status)? }));
        debug!("Patching status of PodFlame {}/{}", namespace, name);
        Ok(self
            .podflames(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn publish_event(&self, podflame: &PodFlame, event: ProfilerEvent) -> Result<(), ClusterError> {
        let type_ = match event.severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };
        let reference = podflame.object_ref(&());
        self.recorder
            .publish(
                &Event {
                    type_,
                    reason: event.reason,
                    note: Some(event.note),
                    action: event.action,
                    secondary: None,
                },
                &reference,
            )
            .await?;
        Ok(())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        Ok(self.pods(namespace).get(name).await?)
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        Ok(self.pods(namespace).create(&PostParams::default(), pod).await?)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.pods(namespace).delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClusterError> {
        let list = self
            .pods(namespace)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(list.items)
    }

    async fn delete_pods(&self, namespace: &str, selector: &str) -> Result<(), ClusterError> {
        self.pods(namespace)
            .delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await?;
        Ok(())
    }

    async fn read_pod_logs(
        &self,
        namespace: &str,
        name: &str,
        limit_bytes: usize,
    ) -> Result<PodLogs, ClusterError> {
        // One extra byte tells a stream that fits exactly apart from one that overflows
        let requested = limit_bytes.saturating_add(1);
        let params = LogParams {
            limit_bytes: Some(i64::try_from(requested).unwrap_or(i64::MAX)),
            ..LogParams::default()
        };
        let stream = Box::pin(self.pods(namespace).log_stream(name, &params).await?);

        // Raw bytes: the server cut may split a character, and the agent may
        // print anything
        let mut raw = Vec::new();
        stream
            .take(u64::try_from(requested).unwrap_or(u64::MAX))
            .read_to_end(&mut raw)
            .await
            .map_err(|e| ClusterError::Transport(format!("reading logs of pod {}/{}: {}", namespace, name, e)))?;
        debug!("Read {} log bytes from pod {}/{}", raw.len(), namespace, name);
        Ok(PodLogs::bounded(raw, limit_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request, Response};
    use http_body::Frame;
    use http_body_util::StreamBody;
    use kube::client::Body;
    use std::convert::Infallible;

    /// Client whose API server answers every request with `status` and `body`,
    /// honouring the `limitBytes` query parameter like the kubelet does
    fn api_server(status: u16, body: &'static [u8]) -> ClusterClient {
        let service = tower::service_fn(move |req: Request<Body>| async move {
            let limit = req
                .uri()
                .query()
                .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("limitBytes=")))
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(body.len());
            let served = body[..limit.min(body.len())].to_vec();
            Ok::<_, Infallible>(Response::builder().status(status).body(Body::from(served)).unwrap())
        });
        ClusterClient::new(Client::new(service, "default"))
    }

    #[tokio::test]
    async fn test_logs_cut_inside_character() {
        // "é" straddles the cut the server makes at limit + 1
        let client = api_server(200, "abcdé-graph".as_bytes());

        let logs = client.read_pod_logs("ns-operator", "ns-req1", 4).await.unwrap();
        assert_eq!(logs.content, "abcd");
        assert!(logs.truncated);

        let logs = client.read_pod_logs("ns-operator", "ns-req1", 5).await.unwrap();
        assert_eq!(logs.content, "abcd");
        assert!(logs.truncated);
    }

    #[tokio::test]
    async fn test_logs_with_invalid_utf8() {
        let client = api_server(200, b"graph\xFFdata");

        let logs = client.read_pod_logs("ns-operator", "ns-req1", 1024).await.unwrap();
        assert_eq!(logs.content, "graph\u{FFFD}data");
        assert!(!logs.truncated);
    }

    #[tokio::test]
    async fn test_logs_that_fit_exactly() {
        let client = api_server(200, b"graph-data");

        let logs = client.read_pod_logs("ns-operator", "ns-req1", 10).await.unwrap();
        assert_eq!(logs.content, "graph-data");
        assert!(!logs.truncated);
    }

    #[tokio::test]
    async fn test_logs_of_missing_pod() {
        let client = api_server(
            404,
            br#"{"kind":"Status","apiVersion":"v1","metadata":{},"status":"Failure","message":"pods \"ns-req1\" not found","reason":"NotFound","code":404}"#,
        );

        let err = client.read_pod_logs("ns-operator", "ns-req1", 1024).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_logs_stream_failure_is_transport() {
        // Connection drops after the first chunk of output
        let service = tower::service_fn(|_req: Request<Body>| async move {
            let frames: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
                Ok(Frame::data(Bytes::from_static(b"graph"))),
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset")),
            ];
            Ok::<_, Infallible>(Response::new(StreamBody::new(futures::stream::iter(frames))))
        });
        let client = ClusterClient::new(Client::new(service, "default"));

        let err = client.read_pod_logs("ns-operator", "ns-req1", 1024).await.unwrap_err();
        assert!(matches!(err, ClusterError::Transport(_)), "unexpected error: {err}");
    }
}
