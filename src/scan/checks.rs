//! Individual scan checks
//!
//! Every check reads the snapshot only. Objects whose relevant fields cannot
//! be parsed are skipped with a debug log, never reported as findings.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::{Finding, Rule};
use crate::models::{
    ClusterObject, ObjectKey, get_nested, get_nested_i64, get_nested_map, get_nested_slice,
    get_nested_string,
};
use crate::snapshot::{LabelSelector, SelectorError, SnapshotIndex};

/// Scale target kinds that are always checked
const SCALE_TARGET_KINDS: &[&str] = &[
    "Deployment",
    "StatefulSet",
    "ReplicaSet",
    "ReplicationController",
];

fn kubectl_pods(namespace: &str, selector: &LabelSelector) -> String {
    format!(
        "kubectl get pods -n {} -l '{}'",
        namespace,
        selector.to_kubectl()
    )
}

fn kubectl_get(kind: &str, namespace: &str, name: &str) -> String {
    format!(
        "kubectl get {} {} -n {}",
        kind.to_lowercase(),
        name,
        namespace
    )
}

fn parse_selector(
    obj: &ClusterObject,
    parsed: Result<LabelSelector, SelectorError>,
) -> Option<LabelSelector> {
    match parsed {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!("Skipping {}: malformed selector: {}", obj.key(), e);
            None
        }
    }
}

pub fn service_selectors(index: &SnapshotIndex, rule: &Rule) -> Vec<Finding> {
    let mut findings = Vec::new();

    for svc in index.of_kind("Service") {
        // ExternalName services redirect by DNS and never select pods
        if get_nested_string(&svc.spec, &["type"]) == Some("ExternalName") {
            continue;
        }
        // Empty selectors mean endpoints are managed elsewhere
        let Some(raw) = get_nested(&svc.spec, &["selector"]) else {
            continue;
        };
        let Some(selector) = parse_selector(svc, LabelSelector::from_equality_map(raw)) else {
            continue;
        };
        if selector.is_empty() || !index.select(&svc.namespace, "Pod", &selector).is_empty() {
            continue;
        }

        let mut message = format!(
            "Service {} selector {} matches no pods in namespace {}",
            svc.name, selector, svc.namespace
        );
        let elsewhere = index.namespaces_matching_elsewhere(&svc.namespace, "Pod", &selector);
        if !elsewhere.is_empty() {
            let names: Vec<&str> = elsewhere.iter().map(String::as_str).collect();
            message.push_str(&format!(
                " (matching pods exist in other namespaces: {})",
                names.join(", ")
            ));
        }

        findings.push(rule.finding(
            svc.key(),
            None,
            message,
            kubectl_pods(&svc.namespace, &selector),
        ));
    }

    findings
}

/// Service names an Ingress routes to, with where each reference sits
fn ingress_backend_refs(ingress: &ClusterObject) -> Vec<(String, String)> {
    fn backend_service(backend: &Value) -> Option<&str> {
        // networking.k8s.io/v1, then the extensions/v1beta1 layout
        get_nested_string(backend, &["service", "name"])
            .or_else(|| get_nested_string(backend, &["serviceName"]))
    }

    let mut refs = Vec::new();
    let default_backend = get_nested(&ingress.spec, &["defaultBackend"])
        .or_else(|| get_nested(&ingress.spec, &["backend"]));
    if let Some(name) = default_backend.and_then(backend_service) {
        refs.push(("default backend".to_string(), name.to_string()));
    }

    for rule in get_nested_slice(&ingress.spec, &["rules"]).unwrap_or_default() {
        let host = get_nested_string(rule, &["host"]).unwrap_or("*");
        for path in get_nested_slice(rule, &["http", "paths"]).unwrap_or_default() {
            let Some(name) = get_nested(path, &["backend"]).and_then(backend_service) else {
                continue;
            };
            let route = get_nested_string(path, &["path"]).unwrap_or("/");
            refs.push((format!("{}{}", host, route), name.to_string()));
        }
    }

    refs
}

pub fn ingress_backends(index: &SnapshotIndex, rule: &Rule) -> Vec<Finding> {
    let mut findings = Vec::new();

    for ingress in index.of_kind("Ingress") {
        let mut reported = BTreeSet::new();
        for (location, service) in ingress_backend_refs(ingress) {
            let target = ObjectKey::new("Service", &ingress.namespace, &service);
            if index.contains(&target) || !reported.insert(service.clone()) {
                continue;
            }
            findings.push(rule.finding(
                ingress.key(),
                Some(target),
                format!(
                    "Ingress {} routes {} to Service {} which does not exist in namespace {}",
                    ingress.name, location, service, ingress.namespace
                ),
                kubectl_get("service", &ingress.namespace, &service),
            ));
        }
    }

    findings
}

pub fn route_backends(index: &SnapshotIndex, rule: &Rule) -> Vec<Finding> {
    let mut findings = Vec::new();

    for route in index.of_kind("HTTPRoute") {
        let mut reported = BTreeSet::new();
        let rules = get_nested_slice(&route.spec, &["rules"]).unwrap_or_default();
        for backend in rules
            .iter()
            .flat_map(|r| get_nested_slice(r, &["backendRefs"]).unwrap_or_default())
        {
            let kind = get_nested_string(backend, &["kind"]).unwrap_or("Service");
            let group = get_nested_string(backend, &["group"]).unwrap_or("");
            if kind != "Service" || !group.is_empty() {
                continue;
            }
            let Some(name) = get_nested_string(backend, &["name"]) else {
                continue;
            };
            let namespace = get_nested_string(backend, &["namespace"]).unwrap_or(&route.namespace);
            let target = ObjectKey::new("Service", namespace, name);
            if index.contains(&target) || !reported.insert(target.clone()) {
                continue;
            }
            findings.push(rule.finding(
                route.key(),
                Some(target),
                format!(
                    "HTTPRoute {} has a backendRef to Service {} which does not exist in namespace {}",
                    route.name, name, namespace
                ),
                kubectl_get("service", namespace, name),
            ));
        }
    }

    findings
}

pub fn hpa_targets(index: &SnapshotIndex, rule: &Rule) -> Vec<Finding> {
    let mut findings = Vec::new();

    for hpa in index.of_kind("HorizontalPodAutoscaler") {
        let (Some(kind), Some(name)) = (
            get_nested_string(&hpa.spec, &["scaleTargetRef", "kind"]),
            get_nested_string(&hpa.spec, &["scaleTargetRef", "name"]),
        ) else {
            tracing::debug!("Skipping {}: incomplete scaleTargetRef", hpa.key());
            continue;
        };

        // Custom scalable kinds are only judged when the snapshot lists that kind
        if !SCALE_TARGET_KINDS.contains(&kind) && !index.has_kind(kind) {
            continue;
        }

        let target = ObjectKey::new(kind, &hpa.namespace, name);
        if index.contains(&target) {
            continue;
        }
        findings.push(rule.finding(
            hpa.key(),
            Some(target),
            format!(
                "HorizontalPodAutoscaler {} scales {} {} which does not exist in namespace {}",
                hpa.name, kind, name, hpa.namespace
            ),
            kubectl_get(kind, &hpa.namespace, name),
        ));
    }

    findings
}

fn int_or_string(spec: &Value, field: &str) -> Option<IntOrString> {
    let raw = get_nested(spec, &[field])?;
    serde_json::from_value(raw.clone()).ok()
}

/// Parse a percentage such as `"100%"`
fn percent(value: &str) -> Option<i64> {
    value.trim().strip_suffix('%')?.trim().parse().ok()
}

/// Replicas the workloads behind `selector` want in total
///
/// Sums `spec.replicas` (default 1) of Deployments, StatefulSets and
/// ReplicaSets not owned by a controller whose pod template the selector
/// matches. Falls back to counting matching pods. `None` when neither is known.
pub fn expected_replicas(
    index: &SnapshotIndex,
    namespace: &str,
    selector: &LabelSelector,
) -> Option<i64> {
    let template_matches = |obj: &&ClusterObject| {
        get_nested_map(&obj.spec, &["template", "metadata", "labels"])
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect::<BTreeMap<String, String>>()
            })
            .is_some_and(|labels| selector.matches(&labels))
    };

    let workloads: Vec<&ClusterObject> = ["Deployment", "StatefulSet", "ReplicaSet"]
        .iter()
        .flat_map(|kind| index.in_namespace(namespace, kind))
        .filter(|obj| obj.kind != "ReplicaSet" || obj.controller_ref().is_none())
        .filter(template_matches)
        .collect();

    if !workloads.is_empty() {
        return Some(
            workloads
                .iter()
                .map(|w| get_nested_i64(&w.spec, &["replicas"]).unwrap_or(1))
                .sum(),
        );
    }

    let pods = index.select(namespace, "Pod", selector).len();
    (pods > 0).then_some(pods as i64)
}

/// Why a budget blocks every eviction, if it does
fn blocked_reason(
    index: &SnapshotIndex,
    pdb: &ClusterObject,
    selector: &LabelSelector,
) -> Option<String> {
    match int_or_string(&pdb.spec, "maxUnavailable") {
        Some(IntOrString::Int(0)) => return Some("maxUnavailable is 0".to_string()),
        Some(IntOrString::String(s)) if percent(&s) == Some(0) || s.trim() == "0" => {
            return Some(format!("maxUnavailable is {}", s));
        }
        _ => {}
    }

    match int_or_string(&pdb.spec, "minAvailable")? {
        IntOrString::String(s) => match percent(&s) {
            Some(p) if p >= 100 => Some(format!("minAvailable is {}", s)),
            Some(_) => None,
            None => {
                let count: i64 = s.trim().parse().ok()?;
                min_available_blocks(index, pdb, selector, count)
            }
        },
        IntOrString::Int(count) => min_available_blocks(index, pdb, selector, i64::from(count)),
    }
}

fn min_available_blocks(
    index: &SnapshotIndex,
    pdb: &ClusterObject,
    selector: &LabelSelector,
    count: i64,
) -> Option<String> {
    let Some(replicas) = expected_replicas(index, &pdb.namespace, selector) else {
        tracing::debug!("Skipping {}: no workload or pod matches its selector", pdb.key());
        return None;
    };
    // A zero budget, or workloads scaled to zero, leave nothing to block
    (count > 0 && replicas > 0 && count >= replicas).then(|| {
        format!(
            "minAvailable is {} and the selected workloads run {} replicas",
            count, replicas
        )
    })
}

pub fn pdb_evictions(index: &SnapshotIndex, rule: &Rule) -> Vec<Finding> {
    let mut findings = Vec::new();

    for pdb in index.of_kind("PodDisruptionBudget") {
        let raw = get_nested(&pdb.spec, &["selector"]).unwrap_or(&Value::Null);
        let Some(selector) = parse_selector(pdb, LabelSelector::from_value(raw)) else {
            continue;
        };
        let Some(reason) = blocked_reason(index, pdb, &selector) else {
            continue;
        };

        findings.push(rule.finding(
            pdb.key(),
            None,
            format!(
                "PodDisruptionBudget {} blocks all voluntary evictions: {} (selector {})",
                pdb.name, reason, selector
            ),
            format!(
                "kubectl get pdb {} -n {} -o jsonpath='{{.status.disruptionsAllowed}}'",
                pdb.name, pdb.namespace
            ),
        ));
    }

    findings
}

pub fn network_policy_selectors(index: &SnapshotIndex, rule: &Rule) -> Vec<Finding> {
    let mut findings = Vec::new();

    for policy in index.of_kind("NetworkPolicy") {
        let raw = get_nested(&policy.spec, &["podSelector"]).unwrap_or(&Value::Null);
        let Some(selector) = parse_selector(policy, LabelSelector::from_value(raw)) else {
            continue;
        };
        // An empty podSelector deliberately selects every pod
        if selector.is_empty() || !index.select(&policy.namespace, "Pod", &selector).is_empty() {
            continue;
        }

        findings.push(rule.finding(
            policy.key(),
            None,
            format!(
                "NetworkPolicy {} podSelector {} matches no pods in namespace {}",
                policy.name, selector, policy.namespace
            ),
            kubectl_pods(&policy.namespace, &selector),
        ));
    }

    findings
}
