//! Snapshot files
//!
//! Reads snapshots from YAML or JSON: a single object, a multi-document
//! stream, a `List` (anything with `items`), or a top-level sequence. Writes
//! snapshots as a `List` so `kubectl get -o yaml` output and our own dumps are
//! interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{SnapshotIndex, SnapshotSource};
use crate::models::ClusterObject;

/// Failures reading or writing snapshot files
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// On-disk envelope for snapshots we write ourselves
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotList {
    api_version: String,
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    captured_at: Option<DateTime<Utc>>,
    items: Vec<ClusterObject>,
}

/// Parse snapshot contents into an index
///
/// Documents that are not objects (missing `kind` or `metadata.name`) are
/// skipped with a warning rather than failing the whole file.
pub fn parse_snapshot(contents: &str, path: &Path) -> Result<SnapshotIndex, SnapshotError> {
    let mut objects = Vec::new();
    let mut captured_at = None;

    for document in serde_yaml::Deserializer::from_str(contents) {
        let value = Value::deserialize(document).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if captured_at.is_none() {
            captured_at = value
                .get("capturedAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
        }
        collect_objects(value, &mut objects);
    }

    tracing::debug!("Loaded {} objects from {}", objects.len(), path.display());

    let index = SnapshotIndex::new(objects);
    Ok(match captured_at {
        Some(ts) => index.with_captured_at(ts),
        None => index,
    })
}

fn collect_objects(value: Value, out: &mut Vec<ClusterObject>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                collect_objects(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("items") {
                for item in items {
                    collect_objects(item, out);
                }
                return;
            }
            let value = Value::Object(map);
            match ClusterObject::from_value(value) {
                Ok(obj) if !obj.kind.is_empty() && !obj.name.is_empty() => out.push(obj),
                Ok(obj) => {
                    tracing::warn!(
                        "Skipping snapshot document without kind or name (kind={:?}, name={:?})",
                        obj.kind,
                        obj.name
                    );
                }
                Err(e) => tracing::warn!("Skipping malformed snapshot document: {}", e),
            }
        }
        other => tracing::warn!("Skipping non-object snapshot document: {}", other),
    }
}

/// Read a snapshot file from disk
pub fn load_snapshot(path: &Path) -> Result<SnapshotIndex, SnapshotError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(&contents, path)
}

/// Render a snapshot as a YAML `List`
pub fn render_snapshot(index: &SnapshotIndex) -> Result<String, SnapshotError> {
    let list = SnapshotList {
        api_version: "v1".to_string(),
        kind: "List".to_string(),
        captured_at: index.captured_at(),
        items: index.objects().to_vec(),
    };
    Ok(serde_yaml::to_string(&list)?)
}

/// Write a snapshot to disk as a YAML `List`
pub fn save_snapshot(index: &SnapshotIndex, path: &Path) -> Result<(), SnapshotError> {
    let yaml = render_snapshot(index)?;
    std::fs::write(path, yaml).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Snapshot source backed by a file on disk
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn snapshot(&self) -> anyhow::Result<SnapshotIndex> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SnapshotError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(parse_snapshot(&contents, &self.path)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_document_stream() {
        let yaml = r#"
apiVersion: v1
kind: Service
metadata:
  name: web
  namespace: shop
spec:
  selector:
    app: web
---
apiVersion: v1
kind: Pod
metadata:
  name: web-1
  namespace: shop
  labels:
    app: web
"#;
        let index = parse_snapshot(yaml, Path::new("inline")).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.get("Service", "shop", "web").is_some());
    }

    #[test]
    fn test_list_and_json() {
        let json = r#"{"apiVersion":"v1","kind":"List","items":[
            {"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"a","namespace":"x"}},
            {"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"b","namespace":"x"}}
        ]}"#;
        let index = parse_snapshot(json, Path::new("inline.json")).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_documents_without_identity_are_skipped() {
        let yaml = "kind: Pod\nmetadata: {}\n---\nfoo: bar\n---\n- 1\n";
        let index = parse_snapshot(yaml, Path::new("inline")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let err = parse_snapshot("kind: [unclosed", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, SnapshotError::Parse { .. }));
    }
}
