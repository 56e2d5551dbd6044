//! Immutable snapshot index
//!
//! The index is the arena every analysis reads from: a flat list of objects
//! plus lookup tables keyed by identity, by (namespace, kind), and by
//! (namespace, label key, label value) for selector evaluation. Nothing holds
//! references into it across calls; callers keep `ObjectKey`s and look them up.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use super::selector::LabelSelector;
use crate::models::{ClusterObject, ObjectKey};

/// Point-in-time collection of cluster objects
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    objects: Vec<ClusterObject>,
    by_key: HashMap<ObjectKey, usize>,
    by_namespace_kind: HashMap<(String, String), Vec<usize>>,
    by_label: HashMap<(String, String, String), Vec<usize>>,
    captured_at: Option<DateTime<Utc>>,
}

impl SnapshotIndex {
    /// Build an index from a list of objects
    ///
    /// When two objects share an identity the later one wins, matching what a
    /// watch stream would converge to.
    pub fn new(objects: impl IntoIterator<Item = ClusterObject>) -> Self {
        let mut deduped: Vec<ClusterObject> = Vec::new();
        let mut by_key: HashMap<ObjectKey, usize> = HashMap::new();

        for obj in objects {
            let key = obj.key();
            match by_key.get(&key) {
                Some(&idx) => {
                    tracing::debug!("Duplicate object {} in snapshot, keeping latest", key);
                    deduped[idx] = obj;
                }
                None => {
                    by_key.insert(key, deduped.len());
                    deduped.push(obj);
                }
            }
        }

        let mut by_namespace_kind: HashMap<(String, String), Vec<usize>> = HashMap::new();
        let mut by_label: HashMap<(String, String, String), Vec<usize>> = HashMap::new();
        for (idx, obj) in deduped.iter().enumerate() {
            by_namespace_kind
                .entry((obj.namespace.clone(), obj.kind.clone()))
                .or_default()
                .push(idx);
            for (k, v) in &obj.labels {
                by_label
                    .entry((obj.namespace.clone(), k.clone(), v.clone()))
                    .or_default()
                    .push(idx);
            }
        }

        tracing::debug!(
            "Indexed {} objects across {} (namespace, kind) groups",
            deduped.len(),
            by_namespace_kind.len()
        );

        Self {
            objects: deduped,
            by_key,
            by_namespace_kind,
            by_label,
            captured_at: None,
        }
    }

    /// Record when the snapshot was taken
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in insertion order
    pub fn objects(&self) -> &[ClusterObject] {
        &self.objects
    }

    pub fn get(&self, kind: &str, namespace: &str, name: &str) -> Option<&ClusterObject> {
        self.get_key(&ObjectKey::new(kind, namespace, name))
    }

    pub fn get_key(&self, key: &ObjectKey) -> Option<&ClusterObject> {
        self.by_key.get(key).map(|&idx| &self.objects[idx])
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// All objects of a kind, across namespaces
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ClusterObject> + 'a {
        self.objects.iter().filter(move |o| o.kind == kind)
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.objects.iter().any(|o| o.kind == kind)
    }

    /// Objects of a kind in one namespace
    pub fn in_namespace<'a>(
        &'a self,
        namespace: &str,
        kind: &str,
    ) -> impl Iterator<Item = &'a ClusterObject> + use<'a> {
        self.by_namespace_kind
            .get(&(namespace.to_string(), kind.to_string()))
            .into_iter()
            .flatten()
            .map(move |&idx| &self.objects[idx])
    }

    /// Objects of `kind` in `namespace` whose labels satisfy `selector`
    ///
    /// Matching never crosses namespaces. An empty selector matches every
    /// object of the kind in the namespace.
    pub fn select<'a>(
        &'a self,
        namespace: &str,
        kind: &str,
        selector: &LabelSelector,
    ) -> Vec<&'a ClusterObject> {
        // Narrow with the smallest equality posting list when there is one
        let narrowest = selector
            .match_labels()
            .iter()
            .map(|(k, v)| {
                self.by_label
                    .get(&(namespace.to_string(), k.clone(), v.clone()))
            })
            .min_by_key(|list| list.map_or(0, Vec::len));
        let candidates: &[usize] = match narrowest {
            Some(list) => list.map(Vec::as_slice).unwrap_or_default(),
            None => self
                .by_namespace_kind
                .get(&(namespace.to_string(), kind.to_string()))
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };

        candidates
            .iter()
            .map(|&idx| &self.objects[idx])
            .filter(|o| o.kind == kind && selector.matches(&o.labels))
            .collect()
    }

    /// Namespaces other than `namespace` holding objects of `kind` that match `selector`
    pub fn namespaces_matching_elsewhere(
        &self,
        namespace: &str,
        kind: &str,
        selector: &LabelSelector,
    ) -> BTreeSet<String> {
        self.objects
            .iter()
            .filter(|o| o.kind == kind && o.namespace != namespace)
            .filter(|o| selector.matches(&o.labels))
            .map(|o| o.namespace.clone())
            .collect()
    }

    /// Every namespace that holds at least one object
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.objects
            .iter()
            .filter(|o| !o.namespace.is_empty())
            .map(|o| o.namespace.as_str())
            .collect()
    }
}
