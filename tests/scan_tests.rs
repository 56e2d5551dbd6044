//! Structural scan tests
//!
//! One small shop namespace with a mix of intact and dangling references.
//! Rendered findings are kept as inline snapshots so message wording changes
//! show up in review.

use insta::assert_snapshot;
use kscout::models::{ClusterObject, ObjectKey};
use kscout::scan::{
    Finding, HPA_TARGET_MISSING, PDB_BLOCKS_EVICTION, Scanner, Severity, expected_replicas, scan,
};
use kscout::snapshot::{LabelSelector, SnapshotIndex};
use serde_json::{Value, json};

fn object(doc: Value) -> ClusterObject {
    ClusterObject::from_value(doc).expect("valid object document")
}

fn pod(namespace: &str, name: &str, app: &str) -> ClusterObject {
    object(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": namespace, "labels": {"app": app}},
        "status": {"phase": "Running"}
    }))
}

fn service(name: &str, spec: Value) -> ClusterObject {
    object(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": name, "namespace": "shop"},
        "spec": spec
    }))
}

fn pdb(name: &str, spec: Value) -> ClusterObject {
    object(json!({
        "apiVersion": "policy/v1",
        "kind": "PodDisruptionBudget",
        "metadata": {"name": name, "namespace": "shop"},
        "spec": spec
    }))
}

fn hpa(name: &str, kind: &str, target: &str) -> ClusterObject {
    object(json!({
        "apiVersion": "autoscaling/v2",
        "kind": "HorizontalPodAutoscaler",
        "metadata": {"name": name, "namespace": "shop"},
        "spec": {
            "scaleTargetRef": {"apiVersion": "apps/v1", "kind": kind, "name": target},
            "minReplicas": 2,
            "maxReplicas": 5
        }
    }))
}

fn network_policy(name: &str, pod_selector: Value) -> ClusterObject {
    object(json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "NetworkPolicy",
        "metadata": {"name": name, "namespace": "shop"},
        "spec": {"podSelector": pod_selector, "policyTypes": ["Ingress"]}
    }))
}

fn web_deployment(replicas: i64) -> ClusterObject {
    object(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": "web", "namespace": "shop"},
        "spec": {
            "replicas": replicas,
            "selector": {"matchLabels": {"app": "web"}},
            "template": {"metadata": {"labels": {"app": "web"}}}
        }
    }))
}

fn shop() -> SnapshotIndex {
    SnapshotIndex::new([
        pod("shop", "web-1", "web"),
        pod("shop", "web-2", "web"),
        pod("staging", "api-1", "api"),
        web_deployment(2),
        service("web", json!({"selector": {"app": "web"}})),
        service("api", json!({"selector": {"app": "api"}})),
        service("payments", json!({"type": "ExternalName", "externalName": "pay.example.com"})),
        service("legacy", json!({"ports": [{"port": 80}]})),
        object(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {"name": "storefront", "namespace": "shop"},
            "spec": {
                "defaultBackend": {"service": {"name": "web", "port": {"number": 80}}},
                "rules": [{
                    "host": "shop.example.com",
                    "http": {"paths": [
                        {"path": "/api", "pathType": "Prefix",
                         "backend": {"service": {"name": "api", "port": {"number": 80}}}},
                        {"path": "/static", "pathType": "Prefix",
                         "backend": {"service": {"name": "static", "port": {"number": 80}}}}
                    ]}
                }]
            }
        })),
        object(json!({
            "apiVersion": "gateway.networking.k8s.io/v1",
            "kind": "HTTPRoute",
            "metadata": {"name": "checkout", "namespace": "shop"},
            "spec": {
                "parentRefs": [{"name": "public"}],
                "rules": [
                    {"backendRefs": [{"name": "checkout", "port": 8080}]},
                    {"backendRefs": [
                        {"name": "web", "port": 80},
                        {"group": "example.com", "kind": "Bucket", "name": "assets"}
                    ]}
                ]
            }
        })),
        hpa("web", "Deployment", "web"),
        hpa("worker", "Deployment", "worker"),
        hpa("canary", "Rollout", "canary"),
        pdb("web-pdb", json!({"minAvailable": 2, "selector": {"matchLabels": {"app": "web"}}})),
        pdb("strict", json!({"maxUnavailable": 0, "selector": {"matchLabels": {"app": "web"}}})),
        pdb("loose", json!({"minAvailable": "50%", "selector": {"matchLabels": {"app": "web"}}})),
        network_policy("deny-all", json!({})),
        network_policy("db", json!({"matchLabels": {"app": "db"}})),
    ])
}

fn render(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| format!("{} {} {}: {}", f.severity, f.rule_id, f.subject, f.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_shop_findings() {
    let findings = scan(&shop());

    assert_snapshot!(render(&findings), @r"
    high ingress-backend-missing Ingress/shop/storefront: Ingress storefront routes shop.example.com/static to Service static which does not exist in namespace shop
    high pdb-blocks-eviction PodDisruptionBudget/shop/strict: PodDisruptionBudget strict blocks all voluntary evictions: maxUnavailable is 0 (selector app=web)
    high pdb-blocks-eviction PodDisruptionBudget/shop/web-pdb: PodDisruptionBudget web-pdb blocks all voluntary evictions: minAvailable is 2 and the selected workloads run 2 replicas (selector app=web)
    high route-backend-missing HTTPRoute/shop/checkout: HTTPRoute checkout has a backendRef to Service checkout which does not exist in namespace shop
    high service-selector-no-match Service/shop/api: Service api selector app=api matches no pods in namespace shop (matching pods exist in other namespaces: staging)
    warning hpa-target-missing HorizontalPodAutoscaler/shop/worker: HorizontalPodAutoscaler worker scales Deployment worker which does not exist in namespace shop
    warning networkpolicy-selector-no-match NetworkPolicy/shop/db: NetworkPolicy db podSelector app=db matches no pods in namespace shop
    ");
}

#[test]
fn test_findings_carry_targets_and_verify_commands() {
    let findings = scan(&shop());

    let ingress = findings
        .iter()
        .find(|f| f.rule_id == "ingress-backend-missing")
        .unwrap();
    assert_eq!(ingress.target, Some(ObjectKey::new("Service", "shop", "static")));
    assert_eq!(ingress.verify_command, "kubectl get service static -n shop");

    let service = findings
        .iter()
        .find(|f| f.rule_id == "service-selector-no-match")
        .unwrap();
    assert_eq!(service.verify_command, "kubectl get pods -n shop -l 'app=api'");

    let hpa = findings.iter().find(|f| f.rule_id == HPA_TARGET_MISSING).unwrap();
    assert_eq!(hpa.verify_command, "kubectl get deployment worker -n shop");
}

#[test]
fn test_scanner_filters() {
    let index = shop();

    let high = Scanner::new().min_severity(Severity::High).scan(&index);
    assert_eq!(high.len(), 5);
    assert!(high.iter().all(|f| f.severity == Severity::High));

    let without_pdb = Scanner::new().disable(PDB_BLOCKS_EVICTION).scan(&index);
    assert_eq!(without_pdb.len(), 5);
    assert!(without_pdb.iter().all(|f| f.rule_id != PDB_BLOCKS_EVICTION));

    let staging = Scanner::new().namespace("staging").scan(&index);
    assert!(staging.is_empty());
}

#[test]
fn test_healthy_namespace_has_no_findings() {
    let index = SnapshotIndex::new([
        pod("shop", "web-1", "web"),
        pod("shop", "web-2", "web"),
        web_deployment(2),
        service("web", json!({"selector": {"app": "web"}})),
        hpa("web", "Deployment", "web"),
        pdb("web-pdb", json!({"minAvailable": 1, "selector": {"matchLabels": {"app": "web"}}})),
        network_policy("web", json!({"matchLabels": {"app": "web"}})),
    ]);

    assert!(scan(&index).is_empty());
}

#[test]
fn test_cross_namespace_pods_never_satisfy_a_service() {
    let index = SnapshotIndex::new([
        pod("other", "web-1", "web"),
        service("web", json!({"selector": {"app": "web"}})),
    ]);

    let findings = scan(&index);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.ends_with("(matching pods exist in other namespaces: other)"));
}

#[test]
fn test_malformed_objects_are_skipped() {
    let index = SnapshotIndex::new([
        service("broken", json!({"selector": ["app", "web"]})),
        network_policy(
            "broken",
            json!({"matchExpressions": [{"key": "app", "operator": "Near", "values": ["web"]}]}),
        ),
        object(json!({
            "apiVersion": "autoscaling/v2",
            "kind": "HorizontalPodAutoscaler",
            "metadata": {"name": "half", "namespace": "shop"},
            "spec": {"scaleTargetRef": {"kind": "Deployment"}}
        })),
    ]);

    assert!(scan(&index).is_empty());
}

#[test]
fn test_pdb_percentages_and_unknown_replicas() {
    let full = SnapshotIndex::new([pdb(
        "full",
        json!({"minAvailable": "100%", "selector": {"matchLabels": {"app": "web"}}}),
    )]);
    let findings = scan(&full);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("minAvailable is 100%"));

    let zero_percent = SnapshotIndex::new([pdb(
        "zero",
        json!({"maxUnavailable": "0%", "selector": {"matchLabels": {"app": "web"}}}),
    )]);
    assert_eq!(scan(&zero_percent).len(), 1);

    // Nothing says how many replicas run, so an integer minAvailable is not judged
    let unknown = SnapshotIndex::new([pdb(
        "unknown",
        json!({"minAvailable": 3, "selector": {"matchLabels": {"app": "web"}}}),
    )]);
    assert!(scan(&unknown).is_empty());
}

#[test]
fn test_pdb_min_available_below_replicas_is_allowed() {
    let index = SnapshotIndex::new([
        web_deployment(3),
        pdb("web-pdb", json!({"minAvailable": 1, "selector": {"matchLabels": {"app": "web"}}})),
    ]);
    assert!(scan(&index).is_empty());

    let index = SnapshotIndex::new([
        web_deployment(3),
        pdb("web-pdb", json!({"minAvailable": 3, "selector": {"matchLabels": {"app": "web"}}})),
    ]);
    let findings = scan(&index);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("minAvailable is 3 and the selected workloads run 3 replicas"));
}

#[test]
fn test_pdb_zero_min_available_never_blocks() {
    let zero_budget = SnapshotIndex::new([
        web_deployment(0),
        pdb("web-pdb", json!({"minAvailable": 0, "selector": {"matchLabels": {"app": "web"}}})),
    ]);
    assert!(scan(&zero_budget).is_empty());

    let running = SnapshotIndex::new([
        web_deployment(2),
        pdb("web-pdb", json!({"minAvailable": 0, "selector": {"matchLabels": {"app": "web"}}})),
    ]);
    assert!(scan(&running).is_empty());

    // Scaled to zero there are no pods left to evict
    let scaled_down = SnapshotIndex::new([
        web_deployment(0),
        pdb("web-pdb", json!({"minAvailable": 2, "selector": {"matchLabels": {"app": "web"}}})),
    ]);
    assert!(scan(&scaled_down).is_empty());
}

#[test]
fn test_network_policy_expression_selector_is_rendered() {
    let web = object(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "web-1", "namespace": "shop", "labels": {"tier": "web"}},
        "status": {"phase": "Running"}
    }));
    let index = SnapshotIndex::new([
        web,
        network_policy(
            "db-ingress",
            json!({"matchExpressions": [{"key": "tier", "operator": "In", "values": ["db"]}]}),
        ),
    ]);

    let findings = scan(&index);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule_id, "networkpolicy-selector-no-match");
    assert_eq!(
        findings[0].message,
        "NetworkPolicy db-ingress podSelector tier In (db) matches no pods in namespace shop"
    );
}

#[test]
fn test_expected_replicas_prefers_workloads_over_pods() {
    let selector = LabelSelector::from_match_labels([("app".to_string(), "web".to_string())].into());

    let with_deployment = SnapshotIndex::new([pod("shop", "web-1", "web"), web_deployment(4)]);
    assert_eq!(expected_replicas(&with_deployment, "shop", &selector), Some(4));

    let pods_only = SnapshotIndex::new([pod("shop", "web-1", "web"), pod("shop", "web-2", "web")]);
    assert_eq!(expected_replicas(&pods_only, "shop", &selector), Some(2));

    assert_eq!(expected_replicas(&SnapshotIndex::default(), "shop", &selector), None);
}

#[test]
fn test_findings_serialize_for_presentation() {
    let findings = scan(&shop());
    let value = serde_json::to_value(&findings[0]).unwrap();
    assert_eq!(value["ruleId"], "ingress-backend-missing");
    assert_eq!(value["severity"], "high");
    assert_eq!(value["subject"]["kind"], "Ingress");
    assert_eq!(value["target"]["name"], "static");
}
