//! Data structures for resolved chains

use serde::Serialize;
use std::fmt;

use crate::models::ObjectKey;
use crate::ownership::{OwnerType, OwnershipResult};
use crate::status::{StatusDetail, StatusState};

/// Where a link came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkOrigin {
    /// An object present in the snapshot
    Cluster,
    /// A locator outside the cluster (repository URL, registry coordinate)
    External,
}

/// Decoded coordinates of a ConfigHub artifact registry reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryCoordinates {
    pub instance: String,
    pub space: String,
    pub target: String,
}

/// Kind-specific provenance details for one link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Last revision the controller fetched or applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryCoordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
}

impl SourceMetadata {
    pub fn is_empty(&self) -> bool {
        *self == SourceMetadata::default()
    }

    /// `key=value` pairs for the fields that are set, in display order
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let plain = [
            ("url", &self.url),
            ("path", &self.path),
            ("branch", &self.branch),
            ("tag", &self.tag),
            ("semver", &self.semver),
            ("commit", &self.commit),
            ("digest", &self.digest),
            ("revision", &self.revision),
            ("chart", &self.chart),
            ("version", &self.chart_version),
            ("registry", &self.registry_host),
            ("unit", &self.unit),
            ("space", &self.space),
        ];
        for (name, value) in plain {
            if let Some(value) = value {
                out.push((name, value.clone()));
            }
        }
        if let Some(coords) = &self.registry {
            out.push((
                "target",
                format!("{}/{}/{}", coords.instance, coords.space, coords.target),
            ));
        }
        out
    }
}

/// One node of a resolved chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub origin: LinkOrigin,
    pub state: StatusState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Status message exactly as the object reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub suspended: bool,
    #[serde(skip_serializing_if = "SourceMetadata::is_empty")]
    pub source: SourceMetadata,
}

impl ChainLink {
    /// Link for an object found in the snapshot
    pub fn cluster(key: ObjectKey, api_version: &str, detail: StatusDetail) -> Self {
        Self {
            kind: key.kind,
            name: key.name,
            namespace: key.namespace,
            api_version: api_version.to_string(),
            origin: LinkOrigin::Cluster,
            state: detail.state,
            reason: detail.reason,
            message: detail.message,
            suspended: detail.suspended,
            source: SourceMetadata::default(),
        }
    }

    /// Terminal link for a locator outside the cluster
    pub fn external(kind: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: locator.into(),
            namespace: String::new(),
            api_version: String::new(),
            origin: LinkOrigin::External,
            state: StatusState::Unknown,
            reason: None,
            message: None,
            suspended: false,
            source: SourceMetadata::default(),
        }
    }

    pub fn with_source(mut self, source: SourceMetadata) -> Self {
        self.source = source;
        self
    }

    pub fn is_external(&self) -> bool {
        self.origin == LinkOrigin::External
    }

    /// Cluster links whose state shows the delivery is not converged
    pub fn is_broken(&self) -> bool {
        self.origin == LinkOrigin::Cluster && self.state.is_unhealthy()
    }

    pub fn key(&self) -> Option<ObjectKey> {
        (self.origin == LinkOrigin::Cluster)
            .then(|| ObjectKey::new(&self.kind, &self.namespace, &self.name))
    }
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            LinkOrigin::External => write!(f, "{} {}", self.kind, self.name),
            LinkOrigin::Cluster if self.namespace.is_empty() => {
                write!(f, "{}/{}", self.kind, self.name)
            }
            LinkOrigin::Cluster => write!(f, "{}/{}/{}", self.kind, self.namespace, self.name),
        }
    }
}

/// Why a chain stopped before reaching a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "object", rename_all = "camelCase")]
pub enum IncompleteReason {
    /// A referenced controller or source is not in the snapshot
    MissingObject(ObjectKey),
    /// The object exists but has no usable upstream reference
    MissingSourceRef(ObjectKey),
    /// The walk came back to an object it had already visited
    Cycle(ObjectKey),
    /// The hop bound was reached
    HopLimit(usize),
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteReason::MissingObject(key) => write!(f, "{} not found in snapshot", key),
            IncompleteReason::MissingSourceRef(key) => {
                write!(f, "{} has no upstream source reference", key)
            }
            IncompleteReason::Cycle(key) => write!(f, "reference cycle through {}", key),
            IncompleteReason::HopLimit(hops) => write!(f, "stopped after {} hops", hops),
        }
    }
}

/// How a chain ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChainEnd {
    /// The outermost link is an external locator
    ExternalSource,
    /// Managed by a tool without an in-cluster controller object
    ExternalController { tool: OwnerType },
    /// Natively applied or unmanaged
    NoManagingSource,
    Incomplete { cause: IncompleteReason },
}

impl fmt::Display for ChainEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainEnd::ExternalSource => f.write_str("external source"),
            ChainEnd::ExternalController { tool } => write!(f, "managed outside the cluster by {}", tool),
            ChainEnd::NoManagingSource => f.write_str("no managing source"),
            ChainEnd::Incomplete { cause } => write!(f, "incomplete: {}", cause),
        }
    }
}

/// Provenance of one object, outermost source first, the object itself last
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub target: ObjectKey,
    pub owner: OwnershipResult,
    pub links: Vec<ChainLink>,
    pub end: ChainEnd,
    /// Index into `links` of the outermost link that is not converged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<usize>,
}

impl Chain {
    pub fn is_complete(&self) -> bool {
        !matches!(self.end, ChainEnd::Incomplete { .. })
    }

    pub fn is_broken(&self) -> bool {
        self.broken_at.is_some()
    }

    pub fn broken_link(&self) -> Option<&ChainLink> {
        self.broken_at.and_then(|idx| self.links.get(idx))
    }

    /// Outermost link, the source when the chain is complete
    pub fn source(&self) -> Option<&ChainLink> {
        self.links.first()
    }

    /// Cluster links between the source and the target
    pub fn hops(&self) -> usize {
        self.links
            .iter()
            .filter(|l| !l.is_external())
            .count()
            .saturating_sub(1)
    }
}
