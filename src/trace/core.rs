//! Core chain resolution
//!
//! Walks an object up through the layers that deployed it: from the object to
//! its managing controller (Kustomization, HelmRelease, Application), through
//! intermediate artifacts (HelmChart, ExternalArtifact) to the source object,
//! and from there to the external locator the source fetches from.
//!
//! The walk only holds `ObjectKey`s and looks every hop up in the snapshot, so
//! a missing object ends the chain early instead of failing the call.

use std::collections::HashSet;

use crate::models::{
    ClusterObject, DeliveryKind, DeliveryRole, ObjectKey, get_nested, get_nested_slice,
    get_nested_string,
};
use crate::ownership::{OwnerType, OwnershipResult, classify};
use crate::snapshot::SnapshotIndex;
use crate::status::describe;
use crate::trace::models::{Chain, ChainEnd, ChainLink, IncompleteReason, SourceMetadata};
use crate::trace::registry::annotate_registry;

pub const DEFAULT_MAX_HOPS: usize = 16;

/// Knobs for chain resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Upper bound on cluster objects visited above the target
    pub max_hops: usize,
    /// Continue through native controller owner references
    pub follow_owner_references: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            follow_owner_references: false,
        }
    }
}

/// Resolve a chain with default options
pub fn resolve(target: &ClusterObject, index: &SnapshotIndex) -> Chain {
    Resolver::new(index).resolve(target)
}

/// Chain resolver bound to one snapshot
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a SnapshotIndex,
    options: ResolveOptions,
}

/// What the walk does after looking at one object
enum Step {
    Enter(ObjectKey),
    External(ChainLink),
    Stop(ChainEnd),
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a SnapshotIndex) -> Self {
        Self {
            index,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Resolve the provenance chain of `target`
    ///
    /// Never fails: missing objects, cycles and the hop bound all produce a
    /// chain marked incomplete.
    pub fn resolve(&self, target: &ClusterObject) -> Chain {
        let owner = classify(target);
        let target_key = target.key();

        // Built leaf-first, reversed at the end
        let mut links = vec![self.cluster_link(target, Some(&owner))];
        let mut visited: HashSet<ObjectKey> = HashSet::from([target_key.clone()]);
        let mut current = target;
        let mut is_target = true;
        let mut hops = 0;

        let end = loop {
            let step = if is_target {
                self.first_step(current, &owner)
            } else {
                self.next_step(current)
            };
            is_target = false;

            match step {
                Step::Stop(end) => break end,
                Step::External(link) => {
                    links.push(link);
                    break ChainEnd::ExternalSource;
                }
                Step::Enter(key) => {
                    if visited.contains(&key) {
                        tracing::debug!("Cycle detected at {} while tracing {}", key, target_key);
                        break incomplete(IncompleteReason::Cycle(key));
                    }
                    if hops >= self.options.max_hops {
                        tracing::debug!("Hop limit reached while tracing {}", target_key);
                        break incomplete(IncompleteReason::HopLimit(self.options.max_hops));
                    }
                    let Some(next) = self.index.get_key(&key) else {
                        break incomplete(IncompleteReason::MissingObject(key));
                    };
                    hops += 1;
                    visited.insert(key);
                    links.push(self.cluster_link(next, None));
                    current = next;
                }
            }
        };

        links.reverse();
        let broken_at = links.iter().position(ChainLink::is_broken);

        Chain {
            target: target_key,
            owner,
            links,
            end,
            broken_at,
        }
    }

    /// Decide where to go from the traced object itself
    fn first_step(&self, target: &ClusterObject, owner: &OwnershipResult) -> Step {
        let delivery = delivery_kind(target);

        match owner.owner_type {
            OwnerType::Flux | OwnerType::Argo => self.controller_step(owner),
            OwnerType::Helm | OwnerType::Terraform | OwnerType::ConfigHub => {
                Step::Stop(ChainEnd::ExternalController {
                    tool: owner.owner_type,
                })
            }
            OwnerType::Kubernetes if self.options.follow_owner_references => {
                self.owner_reference_step(target)
            }
            OwnerType::Kubernetes | OwnerType::Unknown => match delivery {
                Some(kind) => self.upstream_step(target, kind),
                None => Step::Stop(ChainEnd::NoManagingSource),
            },
        }
    }

    /// Decide where to go from an object reached during the walk
    fn next_step(&self, obj: &ClusterObject) -> Step {
        if let Some(kind) = delivery_kind(obj) {
            return self.upstream_step(obj, kind);
        }

        // Only reachable through owner references
        let owner = classify(obj);
        match owner.owner_type {
            OwnerType::Flux | OwnerType::Argo => self.controller_step(&owner),
            OwnerType::Helm | OwnerType::Terraform | OwnerType::ConfigHub => {
                Step::Stop(ChainEnd::ExternalController {
                    tool: owner.owner_type,
                })
            }
            OwnerType::Kubernetes => self.owner_reference_step(obj),
            OwnerType::Unknown => Step::Stop(ChainEnd::NoManagingSource),
        }
    }

    fn controller_step(&self, owner: &OwnershipResult) -> Step {
        let kind = match (owner.owner_type, owner.sub_type.as_str()) {
            (OwnerType::Flux, "helmrelease") => DeliveryKind::HelmRelease,
            (OwnerType::Flux, _) => DeliveryKind::Kustomization,
            _ => DeliveryKind::Application,
        };
        let key = ObjectKey::new(kind.as_str(), &owner.namespace, &owner.name);

        if kind == DeliveryKind::Application && !self.index.contains(&key) {
            // Applications may live outside the default control namespace
            if let Some(found) = self.unique_by_name(kind.as_str(), &owner.name) {
                return Step::Enter(found);
            }
        }
        Step::Enter(key)
    }

    fn owner_reference_step(&self, obj: &ClusterObject) -> Step {
        match obj.controller_ref() {
            Some(owner) => Step::Enter(ObjectKey::new(&owner.kind, &obj.namespace, &owner.name)),
            None => Step::Stop(ChainEnd::NoManagingSource),
        }
    }

    fn upstream_step(&self, obj: &ClusterObject, kind: DeliveryKind) -> Step {
        let missing_ref = || Step::Stop(incomplete(IncompleteReason::MissingSourceRef(obj.key())));

        match kind {
            DeliveryKind::Kustomization
            | DeliveryKind::HelmChart
            | DeliveryKind::ExternalArtifact => match source_ref(&obj.spec, &["sourceRef"], obj) {
                Some(key) => Step::Enter(key),
                None => missing_ref(),
            },
            DeliveryKind::HelmRelease => match self.helmrelease_upstream(obj) {
                Some(key) => Step::Enter(key),
                None => missing_ref(),
            },
            DeliveryKind::Application => match application_locator(obj) {
                Some(link) => Step::External(link),
                None => missing_ref(),
            },
            DeliveryKind::GitRepository
            | DeliveryKind::OCIRepository
            | DeliveryKind::HelmRepository
            | DeliveryKind::Bucket => match source_locator(obj, kind) {
                Some(link) => Step::External(link),
                None => missing_ref(),
            },
        }
    }

    /// HelmRelease upstream, in the order the helm-controller resolves it:
    /// the generated HelmChart, then `spec.chartRef`, then the chart template
    fn helmrelease_upstream(&self, obj: &ClusterObject) -> Option<ObjectKey> {
        if let Some(chart) = get_nested_string(&obj.status, &["helmChart"]) {
            let (namespace, name) = parse_namespaced_name(chart, &obj.namespace);
            let key = ObjectKey::new(DeliveryKind::HelmChart.as_str(), namespace, name);
            if self.index.contains(&key) {
                return Some(key);
            }
            tracing::debug!("HelmChart {} referenced by {} is not in the snapshot", key, obj.key());
        }

        source_ref(&obj.spec, &["chartRef"], obj)
            .or_else(|| source_ref(&obj.spec, &["chart", "spec", "sourceRef"], obj))
    }

    fn unique_by_name(&self, kind: &str, name: &str) -> Option<ObjectKey> {
        let mut matches = self.index.of_kind(kind).filter(|o| o.name == name);
        let first = matches.next()?;
        matches.next().is_none().then(|| first.key())
    }

    fn cluster_link(&self, obj: &ClusterObject, owner: Option<&OwnershipResult>) -> ChainLink {
        let mut meta = object_metadata(obj);
        if let Some(owner) = owner.filter(|o| o.owner_type == OwnerType::ConfigHub) {
            meta.unit = Some(owner.name.clone()).filter(|s| !s.is_empty());
            meta.space = Some(owner.namespace.clone()).filter(|s| !s.is_empty());
        }
        ChainLink::cluster(obj.key(), &obj.api_version, describe(obj)).with_source(meta)
    }
}

fn incomplete(cause: IncompleteReason) -> ChainEnd {
    ChainEnd::Incomplete { cause }
}

fn delivery_kind(obj: &ClusterObject) -> Option<DeliveryKind> {
    DeliveryKind::from_kind_and_group(&obj.kind, obj.api_group())
}

/// Read a `{kind, name, namespace}` reference at `path`
///
/// The namespace defaults to the referencing object's own.
fn source_ref(spec: &serde_json::Value, path: &[&str], obj: &ClusterObject) -> Option<ObjectKey> {
    let reference = get_nested(spec, path)?;
    let kind = get_nested_string(reference, &["kind"])?;
    let name = get_nested_string(reference, &["name"])?;
    let namespace = get_nested_string(reference, &["namespace"]).unwrap_or(&obj.namespace);
    Some(ObjectKey::new(kind, namespace, name))
}

/// Parse a namespaced name reference (format: "namespace/name" or just "name")
fn parse_namespaced_name<'a>(value: &'a str, default_ns: &'a str) -> (&'a str, &'a str) {
    value.split_once('/').unwrap_or((default_ns, value))
}

/// Provenance details recorded on a cluster link
fn object_metadata(obj: &ClusterObject) -> SourceMetadata {
    let spec = &obj.spec;
    let status = &obj.status;
    let text = |doc: &serde_json::Value, path: &[&str]| get_nested_string(doc, path).map(str::to_string);

    let mut meta = SourceMetadata {
        path: text(spec, &["path"]),
        revision: text(status, &["artifact", "revision"])
            .or_else(|| text(status, &["lastAppliedRevision"]))
            .or_else(|| text(status, &["lastAttemptedRevision"])),
        ..SourceMetadata::default()
    };

    match delivery_kind(obj) {
        Some(DeliveryKind::HelmRelease) => {
            meta.chart = text(spec, &["chart", "spec", "chart"]);
            meta.chart_version = text(spec, &["chart", "spec", "version"]);
        }
        Some(DeliveryKind::HelmChart) => {
            meta.chart = text(spec, &["chart"]);
            meta.chart_version = text(spec, &["version"]);
        }
        Some(DeliveryKind::Application) => {
            meta.revision = text(status, &["sync", "revision"]);
        }
        Some(kind) if kind.role() == DeliveryRole::Source => {
            meta.url = source_url(obj, kind);
            ref_fields(&mut meta, spec);
            if let Some(url) = meta.url.clone() {
                annotate_registry(&mut meta, &url);
            }
        }
        _ => {}
    }
    meta
}

fn ref_fields(meta: &mut SourceMetadata, spec: &serde_json::Value) {
    let text = |field: &str| get_nested_string(spec, &["ref", field]).map(str::to_string);
    meta.branch = text("branch");
    meta.tag = text("tag");
    meta.semver = text("semver");
    meta.commit = text("commit");
    meta.digest = text("digest");
}

fn source_url(obj: &ClusterObject, kind: DeliveryKind) -> Option<String> {
    match kind {
        DeliveryKind::Bucket => {
            let endpoint = get_nested_string(&obj.spec, &["endpoint"])?;
            let bucket = get_nested_string(&obj.spec, &["bucketName"])?;
            Some(format!("{}/{}", endpoint.trim_end_matches('/'), bucket))
        }
        _ => get_nested_string(&obj.spec, &["url"]).map(str::to_string),
    }
}

/// Terminal link kind for an external locator
fn locator_kind(url: &str, is_chart: bool) -> &'static str {
    if url.starts_with("oci://") {
        "Registry"
    } else if is_chart {
        "ChartRepository"
    } else {
        "Repository"
    }
}

/// External link for what a source object fetches
fn source_locator(obj: &ClusterObject, kind: DeliveryKind) -> Option<ChainLink> {
    let url = source_url(obj, kind)?;
    let mut meta = SourceMetadata {
        url: Some(url.clone()),
        revision: get_nested_string(&obj.status, &["artifact", "revision"]).map(str::to_string),
        ..SourceMetadata::default()
    };
    ref_fields(&mut meta, &obj.spec);
    annotate_registry(&mut meta, &url);

    let link_kind = match kind {
        DeliveryKind::Bucket => "Bucket",
        DeliveryKind::HelmRepository => locator_kind(&url, true),
        _ => locator_kind(&url, false),
    };
    Some(ChainLink::external(link_kind, url).with_source(meta))
}

/// External link for an Argo CD Application's repository
fn application_locator(obj: &ClusterObject) -> Option<ChainLink> {
    let source = get_nested(&obj.spec, &["source"])
        .filter(|s| s.is_object())
        .or_else(|| get_nested_slice(&obj.spec, &["sources"]).and_then(<[_]>::first))?;

    let url = get_nested_string(source, &["repoURL"])?;
    let chart = get_nested_string(source, &["chart"]).map(str::to_string);
    let mut meta = SourceMetadata {
        url: Some(url.to_string()),
        path: get_nested_string(source, &["path"]).map(str::to_string),
        revision: get_nested_string(source, &["targetRevision"]).map(str::to_string),
        commit: get_nested_string(&obj.status, &["sync", "revision"]).map(str::to_string),
        chart: chart.clone(),
        ..SourceMetadata::default()
    };
    if chart.is_some() {
        meta.chart_version = meta.revision.clone();
    }
    let oci_url = if url.contains("://") {
        url.to_string()
    } else {
        // Argo records OCI Helm repositories without a scheme
        format!("oci://{}", url)
    };
    if chart.is_some() || url.starts_with("oci://") {
        annotate_registry(&mut meta, &oci_url);
    }

    Some(ChainLink::external(locator_kind(url, chart.is_some()), url).with_source(meta))
}
