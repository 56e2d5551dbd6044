//! Snapshot file tests
//!
//! Files on disk go through the same paths the CLI uses: `kscout snapshot`
//! writes with `save_snapshot` and `--snapshot` reads with `FileSnapshotSource`.

use chrono::{TimeZone, Utc};
use kscout::models::ClusterObject;
use kscout::snapshot::{
    FileSnapshotSource, LabelSelector, SnapshotError, SnapshotIndex, SnapshotSource,
    load_snapshot, parse_snapshot, render_snapshot, save_snapshot,
};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const KUBECTL_LIST: &str = r#"
apiVersion: v1
kind: List
items:
- apiVersion: kustomize.toolkit.fluxcd.io/v1
  kind: Kustomization
  metadata:
    name: apps
    namespace: flux-system
  spec:
    path: ./apps
    sourceRef:
      kind: GitRepository
      name: fleet
  status:
    conditions:
    - type: Ready
      status: "True"
- apiVersion: apps/v1
  kind: Deployment
  metadata:
    name: web
    namespace: shop
    labels:
      app: web
      kustomize.toolkit.fluxcd.io/name: apps
      kustomize.toolkit.fluxcd.io/namespace: flux-system
  spec:
    replicas: 2
"#;

fn sample_index() -> SnapshotIndex {
    SnapshotIndex::new([
        ClusterObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "shop"},
            "status": {"phase": "Active"}
        }))
        .unwrap(),
        ClusterObject::new("v1", "Pod", "shop", "web-1")
            .with_labels([("app", "web")])
            .with_annotations([("kubectl.kubernetes.io/restartedAt", "2026-01-01T00:00:00Z")])
            .with_status(json!({"phase": "Running"})),
        ClusterObject::new("v1", "Service", "shop", "web")
            .with_spec(json!({"selector": {"app": "web"}, "ports": [{"port": 80}]})),
    ])
}

#[test]
fn test_kubectl_list_output() {
    let index = parse_snapshot(KUBECTL_LIST, Path::new("cluster.yaml")).unwrap();

    assert_eq!(index.len(), 2);
    assert!(index.captured_at().is_none());

    let deployment = index.get("Deployment", "shop", "web").unwrap();
    assert_eq!(deployment.api_group(), "apps");
    assert_eq!(deployment.label("kustomize.toolkit.fluxcd.io/name"), Some("apps"));
}

#[test]
fn test_save_and_load_keeps_objects_and_capture_time() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.yaml");
    let captured = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();

    save_snapshot(&sample_index().with_captured_at(captured), &path).unwrap();
    let loaded = load_snapshot(&path).unwrap();

    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.captured_at(), Some(captured));

    let ns = loaded.get("Namespace", "", "shop").unwrap();
    assert_eq!(ns.namespace, "");
    let pod = loaded.get("Pod", "shop", "web-1").unwrap();
    assert_eq!(pod.label("app"), Some("web"));
    assert_eq!(
        pod.annotation("kubectl.kubernetes.io/restartedAt"),
        Some("2026-01-01T00:00:00Z")
    );

    let selector = LabelSelector::from_equality_map(&json!({"app": "web"})).unwrap();
    assert_eq!(loaded.select("shop", "Pod", &selector).len(), 1);
}

#[test]
fn test_rendered_snapshot_is_a_list() {
    let yaml = render_snapshot(&sample_index()).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

    assert_eq!(doc["apiVersion"].as_str(), Some("v1"));
    assert_eq!(doc["kind"].as_str(), Some("List"));
    assert_eq!(doc["items"].as_sequence().map(Vec::len), Some(3));
    assert!(doc.get("capturedAt").is_none());
}

#[test]
fn test_top_level_sequence_and_nested_lists() {
    let yaml = r#"
- apiVersion: v1
  kind: ConfigMap
  metadata: {name: a, namespace: x}
- apiVersion: v1
  kind: List
  items:
  - apiVersion: v1
    kind: ConfigMap
    metadata: {name: b, namespace: x}
"#;
    let index = parse_snapshot(yaml, Path::new("inline")).unwrap();
    assert_eq!(index.len(), 2);
    assert!(index.get("ConfigMap", "x", "b").is_some());
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let err = load_snapshot(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, SnapshotError::Read { .. }));
    assert!(err.to_string().contains("absent.yaml"));
}

#[tokio::test]
async fn test_file_source_reads_json() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"apiVersion":"v1","kind":"List","capturedAt":"2026-03-14T09:30:00Z","items":[
            {{"apiVersion":"v1","kind":"Service","metadata":{{"name":"web","namespace":"shop"}}}}
        ]}}"#
    )
    .unwrap();

    let source = FileSnapshotSource::new(file.path());
    assert!(source.describe().starts_with("file "));

    let index = source.snapshot().await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(
        index.captured_at(),
        Some(Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap())
    );
}

#[tokio::test]
async fn test_file_source_reports_parse_errors() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "items: [unclosed").unwrap();

    let err = FileSnapshotSource::new(file.path())
        .snapshot()
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to parse snapshot"));
}
