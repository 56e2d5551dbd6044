//! Live snapshot source
//!
//! Lists every registered kind in parallel and freezes the result into a
//! `SnapshotIndex`. Kinds the cluster does not serve are skipped, so a cluster
//! without Flux, Argo or the Gateway API still produces a usable snapshot.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use kube::Api;
use kube::api::ListParams;
use kube::core::{ApiResource, DynamicObject};
use serde_json::Value;

use super::registry::{KIND_REGISTRY, KindEntry};
use crate::models::ClusterObject;
use crate::snapshot::{SnapshotIndex, SnapshotSource};

/// Snapshot source backed by the API server
#[derive(Clone)]
pub struct LiveSnapshotSource {
    client: kube::Client,
    context: Option<String>,
}

impl LiveSnapshotSource {
    /// Lists every namespace; namespace filters apply to the finished snapshot
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            context: None,
        }
    }

    /// Context name reported by `describe`
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    fn api(&self, resource: &ApiResource) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), resource)
    }

    /// List one kind, trying its versions in preference order
    ///
    /// A 404 means the version (or the whole kind) is not served. Any other
    /// failure is logged and the kind is left out of the snapshot.
    async fn list_kind(&self, entry: &KindEntry) -> Vec<ClusterObject> {
        for version in entry.versions {
            let resource = entry.api_resource(version);
            match self.api(&resource).list(&ListParams::default()).await {
                Ok(list) => {
                    tracing::debug!(
                        "Listed {} {} objects via {}",
                        list.items.len(),
                        entry.kind,
                        resource.api_version
                    );
                    return list
                        .items
                        .into_iter()
                        .filter_map(|obj| to_cluster_object(obj, &resource))
                        .collect();
                }
                Err(e) if is_not_found(&e) => {
                    tracing::debug!("{} is not served, trying next version", resource.api_version);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: failed to list: {}", entry.kind, e);
                    return Vec::new();
                }
            }
        }

        tracing::debug!("Kind {} is not installed", entry.kind);
        Vec::new()
    }
}

#[async_trait]
impl SnapshotSource for LiveSnapshotSource {
    async fn snapshot(&self) -> anyhow::Result<SnapshotIndex> {
        // Fail fast on connectivity before fanning out one request per kind
        self.client
            .apiserver_version()
            .await
            .context("Failed to reach the Kubernetes API server")?;

        let lists = join_all(KIND_REGISTRY.iter().map(|entry| self.list_kind(entry))).await;
        let objects: Vec<ClusterObject> = lists.into_iter().flatten().collect();
        tracing::debug!("Captured {} objects from {}", objects.len(), self.describe());

        Ok(SnapshotIndex::new(objects).with_captured_at(Utc::now()))
    }

    fn describe(&self) -> String {
        let context = self.context.as_deref().unwrap_or("current context");
        format!("cluster ({}, all namespaces)", context)
    }
}

fn is_not_found(error: &kube::Error) -> bool {
    let message = error.to_string();
    message.contains("404") || message.contains("Not Found")
}

/// List responses omit `apiVersion`/`kind` on items, so they are filled in
/// from the resource that was listed
fn to_cluster_object(obj: DynamicObject, resource: &ApiResource) -> Option<ClusterObject> {
    let name = obj.metadata.name.clone().unwrap_or_default();
    let mut value = match serde_json::to_value(obj) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Skipping {} {}: {}", resource.kind, name, e);
            return None;
        }
    };
    if let Value::Object(map) = &mut value {
        map.insert("apiVersion".into(), Value::String(resource.api_version.clone()));
        map.insert("kind".into(), Value::String(resource.kind.clone()));
    }

    match ClusterObject::from_value(value) {
        Ok(obj) => Some(obj),
        Err(e) => {
            tracing::debug!("Skipping {} {}: {}", resource.kind, name, e);
            None
        }
    }
}
