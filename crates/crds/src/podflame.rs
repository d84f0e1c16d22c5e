//! PodFlame CRD
//!
//! Requests a one-shot profiling session against a container of a running pod.
//! The result (or the profiler's error output) is published on the status.

use crate::labels::{LABEL_INSTANCE, LABEL_MANAGED_BY, OPERATOR_NAME, PODFLAME_FINALIZER};
use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pattern accepted for `spec.duration`: minutes and/or seconds, e.g. `2m`, `90s`, `1m30s`
pub const DURATION_PATTERN: &str = r"^(([1-6]?[0-9])[mM])?(([1-6]?[0-9])[sS])?$";

/// Duration used when `spec.duration` is omitted
pub const DEFAULT_DURATION: &str = "2m";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "profilepod.io",
    version = "v1alpha1",
    kind = "PodFlame",
    namespaced,
    status = "PodFlameStatus",
    shortname = "pf",
    printcolumn = r#"{"name":"TARGET", "type":"string", "jsonPath":".spec.targetPod"}"#,
    printcolumn = r#"{"name":"EVENT", "type":"string", "jsonPath":".spec.event"}"#,
    printcolumn = r#"{"name":"DURATION", "type":"string", "jsonPath":".spec.duration"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PodFlameSpec {
    /// Name of the pod to profile (same namespace as the PodFlame)
    pub target_pod: String,

    /// Profiling event
    #[serde(default)]
    pub event: ProfilingEvent,

    /// How long to profile for
    #[serde(default = "default_duration")]
    #[schemars(schema_with = "duration_schema")]
    pub duration: String,

    /// Container to profile; only required when the target pod runs several containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

fn default_duration() -> String {
    DEFAULT_DURATION.to_string()
}

fn duration_schema(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "string",
        "minLength": 1,
        "pattern": DURATION_PATTERN,
        "default": DEFAULT_DURATION,
    })
}

/// Profiling event type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfilingEvent {
    /// On-CPU sampling
    #[default]
    Cpu,
}

impl ProfilingEvent {
    /// Wire name, as handed to the profiling agent
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfilingEvent::Cpu => "cpu",
        }
    }
}

impl std::fmt::Display for ProfilingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed outcome of a profiling session.
///
/// Empty while the session is in progress. Exactly one field is populated once
/// the session reaches a terminal outcome, and neither is ever cleared or
/// rewritten afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodFlameStatus {
    /// Harvested profiler output of a successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flame_graph: Option<String>,

    /// Harvested profiler output of a failed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<String>,
}

impl PodFlameStatus {
    /// Status of a run that produced a flame graph
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            flame_graph: Some(output.into()),
            failed: None,
        }
    }

    /// Status of a run that failed
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            flame_graph: None,
            failed: Some(output.into()),
        }
    }

    /// Non-empty flame graph, if any
    pub fn flame_graph(&self) -> Option<&str> {
        self.flame_graph.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty failure output, if any
    pub fn failure(&self) -> Option<&str> {
        self.failed.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether the session has reached a terminal outcome
    pub fn is_terminal(&self) -> bool {
        self.flame_graph().is_some() || self.failure().is_some()
    }
}

impl PodFlame {
    /// Whether the status already holds a terminal outcome
    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(PodFlameStatus::is_terminal)
    }

    /// Whether deletion has been requested
    pub fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    /// Whether the cleanup finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == PODFLAME_FINALIZER))
    }

    /// Finalizer list with the cleanup finalizer added
    pub fn finalizers_with_cleanup(&self) -> Vec<String> {
        let mut finalizers = self.meta().finalizers.clone().unwrap_or_default();
        if !finalizers.iter().any(|f| f == PODFLAME_FINALIZER) {
            finalizers.push(PODFLAME_FINALIZER.to_string());
        }
        finalizers
    }

    /// Finalizer list with the cleanup finalizer removed
    pub fn finalizers_without_cleanup(&self) -> Vec<String> {
        self.meta()
            .finalizers
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f != PODFLAME_FINALIZER)
            .collect()
    }

    /// Labels identifying the child pods of this PodFlame.
    ///
    /// `None` until the API server has assigned a UID.
    pub fn owner_labels(&self) -> Option<BTreeMap<String, String>> {
        let uid = self.meta().uid.as_ref()?;
        Some(BTreeMap::from([
            (LABEL_INSTANCE.to_string(), uid.clone()),
            (LABEL_MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
        ]))
    }
}
