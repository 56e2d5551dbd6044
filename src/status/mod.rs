//! Health inference
//!
//! Maps an object's status document to one of five independent states.
//! Rules are evaluated in order and the first applicable one wins:
//!
//! 1. A `Ready` condition (Flux, most CRDs, Pods)
//! 2. A `phase` field (Pods, PVCs, Namespaces)
//! 3. Kind-specific replica arithmetic (Deployment, StatefulSet, DaemonSet)
//!    and Argo CD's health/sync pair
//! 4. Otherwise `Unknown`
//!
//! Everything here works on literal documents, so it is testable without a
//! cluster.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::models::{
    ClusterObject, find_condition, get_nested_bool, get_nested_i64, get_nested_string,
};

/// Inferred health of an object
///
/// These are independent states, not a severity scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusState {
    Ready,
    NotReady,
    Failed,
    Pending,
    Unknown,
}

impl StatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusState::Ready => "Ready",
            StatusState::NotReady => "NotReady",
            StatusState::Failed => "Failed",
            StatusState::Pending => "Pending",
            StatusState::Unknown => "Unknown",
        }
    }

    /// States that positively indicate something is wrong or not converged
    pub fn is_unhealthy(&self) -> bool {
        matches!(
            self,
            StatusState::NotReady | StatusState::Failed | StatusState::Pending
        )
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inferred state plus the human-readable evidence behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetail {
    pub state: StatusState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Verbatim status message, when the object carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub suspended: bool,
}

const READY_PHASES: &[&str] = &["Running", "Succeeded", "Bound", "Active"];
const PENDING_PHASES: &[&str] = &["Pending", "ContainerCreating"];
const FAILED_PHASES: &[&str] = &["Failed", "Error", "CrashLoopBackOff"];

/// Infer an object's health state
pub fn infer(obj: &ClusterObject) -> StatusState {
    if !obj.has_status() {
        return StatusState::Unknown;
    }

    from_ready_condition(&obj.status)
        .or_else(|| from_phase(&obj.status))
        .or_else(|| from_kind_rules(obj))
        .unwrap_or(StatusState::Unknown)
}

/// Infer state and collect the reason/message a human needs to see why
pub fn describe(obj: &ClusterObject) -> StatusDetail {
    let state = infer(obj);
    let suspended = get_nested_bool(&obj.spec, &["suspend"]).unwrap_or(false);

    let (reason, message) = match find_condition(&obj.status, "Ready") {
        Some(condition) => (
            string_field(condition, "reason"),
            string_field(condition, "message"),
        ),
        None => (None, fallback_message(obj)),
    };

    StatusDetail {
        state,
        reason,
        message,
        suspended,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn from_ready_condition(status: &Value) -> Option<StatusState> {
    let condition = find_condition(status, "Ready")?;
    Some(match condition.get("status").and_then(Value::as_str) {
        Some("True") => StatusState::Ready,
        Some("False") => StatusState::NotReady,
        _ => StatusState::Pending,
    })
}

fn from_phase(status: &Value) -> Option<StatusState> {
    let phase = get_nested_string(status, &["phase"])?;
    if READY_PHASES.contains(&phase) {
        Some(StatusState::Ready)
    } else if PENDING_PHASES.contains(&phase) {
        Some(StatusState::Pending)
    } else if FAILED_PHASES.contains(&phase) {
        Some(StatusState::Failed)
    } else {
        None
    }
}

fn from_kind_rules(obj: &ClusterObject) -> Option<StatusState> {
    match obj.kind.as_str() {
        "Deployment" => Some(deployment_state(obj)),
        "StatefulSet" => Some(statefulset_state(obj)),
        "DaemonSet" => Some(daemonset_state(obj)),
        "Application" if obj.api_group() == "argoproj.io" => argo_application_state(&obj.status),
        _ => None,
    }
}

fn desired_replicas(obj: &ClusterObject) -> i64 {
    get_nested_i64(&obj.spec, &["replicas"]).unwrap_or(1)
}

fn status_count(obj: &ClusterObject, field: &str) -> i64 {
    get_nested_i64(&obj.status, &[field]).unwrap_or(0)
}

fn deployment_state(obj: &ClusterObject) -> StatusState {
    let desired = desired_replicas(obj);
    let ready = status_count(obj, "readyReplicas");
    let available = status_count(obj, "availableReplicas");
    let replicas = status_count(obj, "replicas");

    if ready == desired && available == desired {
        StatusState::Ready
    } else if replicas == 0 && desired > 0 {
        StatusState::Pending
    } else {
        StatusState::NotReady
    }
}

fn statefulset_state(obj: &ClusterObject) -> StatusState {
    let desired = desired_replicas(obj);
    let ready = status_count(obj, "readyReplicas");
    let replicas = status_count(obj, "replicas");

    if ready == desired {
        StatusState::Ready
    } else if replicas == 0 {
        StatusState::Pending
    } else {
        StatusState::NotReady
    }
}

fn daemonset_state(obj: &ClusterObject) -> StatusState {
    let desired = status_count(obj, "desiredNumberScheduled");
    let ready = status_count(obj, "numberReady");

    if ready == desired && desired > 0 {
        StatusState::Ready
    } else if ready == 0 {
        StatusState::Pending
    } else {
        StatusState::NotReady
    }
}

fn argo_application_state(status: &Value) -> Option<StatusState> {
    let health = get_nested_string(status, &["health", "status"]);
    let sync = get_nested_string(status, &["sync", "status"]);

    match (health, sync) {
        (Some("Healthy"), Some("Synced")) => Some(StatusState::Ready),
        (Some("Degraded") | Some("Missing"), _) => Some(StatusState::Failed),
        (Some("Progressing"), _) | (_, Some("OutOfSync")) => Some(StatusState::NotReady),
        _ => None,
    }
}

/// Message for objects without a Ready condition
fn fallback_message(obj: &ClusterObject) -> Option<String> {
    match obj.kind.as_str() {
        "Deployment" | "StatefulSet" => Some(format!(
            "Replicas: {}/{}",
            status_count(obj, "readyReplicas"),
            desired_replicas(obj)
        )),
        "DaemonSet" => Some(format!(
            "Ready: {}/{}",
            status_count(obj, "numberReady"),
            status_count(obj, "desiredNumberScheduled")
        )),
        "Application" if obj.api_group() == "argoproj.io" => {
            get_nested_string(&obj.status, &["health", "message"])
                .or_else(|| get_nested_string(&obj.status, &["operationState", "message"]))
                .map(str::to_string)
        }
        _ => get_nested_string(&obj.status, &["message"])
            .or_else(|| get_nested_string(&obj.status, &["reason"]))
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_status(kind: &str, spec: Value, status: Value) -> ClusterObject {
        ClusterObject::new("apps/v1", kind, "default", "x")
            .with_spec(spec)
            .with_status(status)
    }

    #[test]
    fn test_ready_condition_unknown_value_is_pending() {
        let obj = with_status(
            "Kustomization",
            Value::Null,
            json!({"conditions": [{"type": "Ready", "status": "Unknown", "reason": "Progressing"}]}),
        );
        assert_eq!(infer(&obj), StatusState::Pending);
    }

    #[test]
    fn test_ready_condition_wins_over_phase() {
        let obj = with_status(
            "Pod",
            Value::Null,
            json!({"phase": "Running", "conditions": [{"type": "Ready", "status": "False"}]}),
        );
        assert_eq!(infer(&obj), StatusState::NotReady);
    }

    #[test]
    fn test_unmapped_phase_falls_through() {
        let obj = with_status("PersistentVolume", Value::Null, json!({"phase": "Released"}));
        assert_eq!(infer(&obj), StatusState::Unknown);
    }

    #[test]
    fn test_deployment_desired_defaults_to_one() {
        let obj = with_status(
            "Deployment",
            json!({}),
            json!({"replicas": 1, "readyReplicas": 1, "availableReplicas": 1}),
        );
        assert_eq!(infer(&obj), StatusState::Ready);
    }

    #[test]
    fn test_describe_surfaces_condition_message() {
        let obj = with_status(
            "Kustomization",
            json!({"suspend": true}),
            json!({"conditions": [{
                "type": "Ready",
                "status": "False",
                "reason": "BuildFailed",
                "message": "kustomize build failed: missing resource"
            }]}),
        );
        let detail = describe(&obj);
        assert_eq!(detail.state, StatusState::NotReady);
        assert_eq!(detail.reason.as_deref(), Some("BuildFailed"));
        assert_eq!(
            detail.message.as_deref(),
            Some("kustomize build failed: missing resource")
        );
        assert!(detail.suspended);
    }

    #[test]
    fn test_describe_workload_summary() {
        let obj = with_status(
            "Deployment",
            json!({"replicas": 3}),
            json!({"replicas": 3, "readyReplicas": 1}),
        );
        assert_eq!(describe(&obj).message.as_deref(), Some("Replicas: 1/3"));
    }
}
