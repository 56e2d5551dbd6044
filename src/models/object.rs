//! Cluster object model
//!
//! `ClusterObject` is the unit every analysis works on. It keeps the
//! metadata we reason about as typed fields and leaves `spec`/`status` as
//! schema-free JSON documents, since orchestrator kinds evolve faster than
//! any typed model could follow.
//!
//! Serialization uses the orchestrator's own document layout (`metadata.labels`,
//! `metadata.ownerReferences`, ...) so a snapshot written to disk can be read
//! back and analysed identically to a live one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of an object inside a snapshot: (kind, namespace, name)
///
/// Cluster-scoped objects use an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// A structural back-reference from an object to the object that created it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

/// One orchestrator object as captured in a snapshot
///
/// Constructed once per snapshot pass and never mutated afterwards.
/// `spec` and `status` are `Value::Null` when the object has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawObject", into = "RawObject")]
pub struct ClusterObject {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
    pub spec: Value,
    pub status: Value,
}

impl ClusterObject {
    /// Create an object with no metadata beyond its identity
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            owner_references: Vec::new(),
            spec: Value::Null,
            status: Value::Null,
        }
    }

    /// Parse an object from its JSON document form
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Convert back into the JSON document form
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.kind, &self.namespace, &self.name)
    }

    /// API group part of `apiVersion` (empty for the core group)
    pub fn api_group(&self) -> &str {
        match self.api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The owner reference flagged as the managing controller, if any
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }

    pub fn has_status(&self) -> bool {
        self.status.as_object().is_some_and(|s| !s.is_empty())
    }

    pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_annotations<K, V>(mut self, annotations: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.annotations
            .extend(annotations.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner_references.push(owner);
        self
    }

    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_status(mut self, status: Value) -> Self {
        self.status = status;
        self
    }
}

/// Wire layout of an object, matching the orchestrator's document shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    spec: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    status: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    owner_references: Vec<OwnerReference>,
}

impl From<RawObject> for ClusterObject {
    fn from(raw: RawObject) -> Self {
        Self {
            api_version: raw.api_version,
            kind: raw.kind,
            namespace: raw.metadata.namespace,
            name: raw.metadata.name,
            labels: raw.metadata.labels,
            annotations: raw.metadata.annotations,
            owner_references: raw.metadata.owner_references,
            spec: raw.spec,
            status: raw.status,
        }
    }
}

impl From<ClusterObject> for RawObject {
    fn from(obj: ClusterObject) -> Self {
        Self {
            api_version: obj.api_version,
            kind: obj.kind,
            metadata: RawMetadata {
                name: obj.name,
                namespace: obj.namespace,
                labels: obj.labels,
                annotations: obj.annotations,
                owner_references: obj.owner_references,
            },
            spec: obj.spec,
            status: obj.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document_shape() {
        let obj = ClusterObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "ReplicaSet",
            "metadata": {
                "name": "web-5d4f",
                "namespace": "shop",
                "labels": {"app": "web"},
                "annotations": {"deployment.kubernetes.io/revision": "3"},
                "ownerReferences": [{
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "name": "web",
                    "uid": "1234",
                    "controller": true
                }]
            },
            "spec": {"replicas": 2},
            "status": {"readyReplicas": 2}
        }))
        .unwrap();

        assert_eq!(obj.kind, "ReplicaSet");
        assert_eq!(obj.namespace, "shop");
        assert_eq!(obj.api_group(), "apps");
        assert_eq!(obj.label("app"), Some("web"));
        assert_eq!(obj.controller_ref().unwrap().name, "web");
        assert_eq!(obj.key().to_string(), "ReplicaSet/shop/web-5d4f");
    }

    #[test]
    fn test_missing_sections_default() {
        let obj = ClusterObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "shop"}
        }))
        .unwrap();

        assert!(obj.namespace.is_empty());
        assert!(obj.spec.is_null());
        assert!(!obj.has_status());
        assert_eq!(obj.api_group(), "");
        assert_eq!(obj.key().to_string(), "Namespace/shop");
    }

    #[test]
    fn test_document_round_trip_is_lossless() {
        let doc = json!({
            "apiVersion": "kustomize.toolkit.fluxcd.io/v1",
            "kind": "Kustomization",
            "metadata": {
                "name": "apps",
                "namespace": "flux-system",
                "labels": {"kustomize.toolkit.fluxcd.io/name": "flux-system"},
                "annotations": {"note": "x"},
                "ownerReferences": [{
                    "apiVersion": "v1",
                    "kind": "ConfigMap",
                    "name": "seed",
                    "controller": false
                }]
            },
            "spec": {"path": "./apps", "sourceRef": {"kind": "GitRepository", "name": "flux-system"}},
            "status": {"conditions": [{"type": "Ready", "status": "True"}]}
        });

        let obj = ClusterObject::from_value(doc).unwrap();
        let again = ClusterObject::from_value(obj.to_value()).unwrap();
        assert_eq!(obj, again);
    }

    #[test]
    fn test_empty_label_values_are_absent() {
        let obj = ClusterObject::new("v1", "Pod", "default", "p").with_labels([("app", "")]);
        assert_eq!(obj.label("app"), None);
    }
}
