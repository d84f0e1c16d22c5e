//! Kubernetes resource watchers.
//!
//! This module wires PodFlame and profiler pod notifications into
//! `kube_runtime::Controller`, which owns the work queue:
//! - PodFlame changes pass through a [`ChangeFilter`] first, so status-only
//!   updates (including our own status writes) do not trigger a pass;
//! - profiler pod changes are routed to their owning PodFlame by annotation;
//! - passes for one PodFlame never overlap, different PodFlames run in
//!   parallel up to the configured concurrency.

use crate::error::ControllerError;
use crate::predicate::ChangeFilter;
use crate::reconciler::Reconciler;
use crate::router::podflame_for_pod;
use crds::{LABEL_MANAGED_BY, OPERATOR_NAME, PodFlame};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, ResourceExt};
use kube_runtime::reflector::{self, ObjectRef};
use kube_runtime::{
    Controller, WatchStreamExt,
    controller::{Action, Config as ControllerConfig},
    watcher,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Watches PodFlames and their profiler pods.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    podflame_api: Api<PodFlame>,
    pod_api: Api<Pod>,
    filter: Arc<dyn ChangeFilter>,
}

impl Watcher {
    /// Creates a new watcher instance.
    ///
    /// `pod_api` must be scoped to the operator namespace.
    pub fn new(
        reconciler: Arc<Reconciler>,
        podflame_api: Api<PodFlame>,
        pod_api: Api<Pod>,
        filter: Arc<dyn ChangeFilter>,
    ) -> Self {
        Self {
            reconciler,
            podflame_api,
            pod_api,
            filter,
        }
    }

    /// Runs the controller until a shutdown signal is received.
    pub async fn watch_podflames(&self) -> Result<(), ControllerError> {
        info!("Starting PodFlame watcher");

        let (reader, writer) = reflector::store();
        let mut gate = TriggerGate::new(self.filter.clone());

        let triggers = watcher(self.podflame_api.clone(), watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .filter_map(move |event| {
                futures::future::ready(match event {
                    Ok(event) => gate.admit(event).map(Ok),
                    Err(e) => Some(Err(e)),
                })
            });

        let managed_by = format!("{}={}", LABEL_MANAGED_BY, OPERATOR_NAME);
        let controller_config = ControllerConfig::default().concurrency(self.reconciler.config().concurrency);

        Controller::for_stream(triggers, reader)
            .watches(
                self.pod_api.clone(),
                watcher::Config::default().labels(&managed_by),
                podflame_for_pod,
            )
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((obj, action)) => debug!("Reconciled {} ({:?})", obj, action),
                    Err(e) => warn!("Controller error: {}", e),
                }
            })
            .await;

        info!("PodFlame watcher stopped");
        Ok(())
    }
}

/// Decides which PodFlame watch events become reconcile triggers.
///
/// Remembers the last version seen per object so the [`ChangeFilter`] can
/// compare against it; entries are dropped when the object is deleted.
struct TriggerGate {
    filter: Arc<dyn ChangeFilter>,
    last_seen: HashMap<ObjectRef<PodFlame>, PodFlame>,
}

impl TriggerGate {
    fn new(filter: Arc<dyn ChangeFilter>) -> Self {
        Self {
            filter,
            last_seen: HashMap::new(),
        }
    }

    fn admit(&mut self, event: watcher::Event<PodFlame>) -> Option<PodFlame> {
        match event {
            watcher::Event::Apply(podflame) | watcher::Event::InitApply(podflame) => {
                let key = ObjectRef::from_obj(&podflame);
                let keep = self.filter.should_reconcile(self.last_seen.get(&key), &podflame);
                self.last_seen.insert(key, podflame.clone());
                if keep {
                    Some(podflame)
                } else {
                    debug!("Ignoring status-only change of PodFlame {}", podflame.name_any());
                    None
                }
            }
            watcher::Event::Delete(podflame) => {
                self.last_seen.remove(&ObjectRef::from_obj(&podflame));
                None
            }
            watcher::Event::Init | watcher::Event::InitDone => None,
        }
    }
}

async fn reconcile(podflame: Arc<PodFlame>, reconciler: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let namespace = podflame.namespace().unwrap_or_default();
    let name = podflame.name_any();
    debug!("Reconciling PodFlame {}/{}", namespace, name);

    let outcome = reconciler.reconcile_podflame(&namespace, &name).await?;
    Ok(action_for(outcome.requeue_after()))
}

fn action_for(requeue_after: Option<std::time::Duration>) -> Action {
    match requeue_after {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}

/// Flat requeue of the whole pass; conflicts are expected under concurrent
/// writers and only logged at info
fn error_policy(podflame: Arc<PodFlame>, error: &ControllerError, reconciler: Arc<Reconciler>) -> Action {
    let namespace = podflame.namespace().unwrap_or_default();
    let name = podflame.name_any();
    if error.is_conflict() {
        info!("Conflict reconciling PodFlame {}/{}, retrying: {}", namespace, name, error);
    } else {
        error!("Reconciliation error for PodFlame {}/{}: {}", namespace, name, error);
    }
    Action::requeue(reconciler.config().error_requeue)
}
