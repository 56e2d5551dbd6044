//! Delivery resource kind definitions
//!
//! Centralized enum for the continuous-delivery kinds the chain resolver knows
//! how to walk: deployers (objects that apply manifests) and sources (objects
//! that fetch artifacts from outside the cluster). Keeps kind strings out of
//! the resolver logic.

use std::fmt;
use std::str::FromStr;

/// Whether a delivery kind applies manifests or fetches them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryRole {
    /// Applies manifests into the cluster and points at an upstream source
    Deployer,
    /// Fetches an artifact from an external locator
    Source,
}

/// Continuous-delivery kinds with a known upstream convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryKind {
    // Flux source controller
    GitRepository,
    OCIRepository,
    HelmRepository,
    Bucket,
    HelmChart,
    ExternalArtifact,
    // Flux kustomize controller
    Kustomization,
    // Flux helm controller
    HelmRelease,
    // Argo CD
    Application,
}

impl DeliveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryKind::GitRepository => "GitRepository",
            DeliveryKind::OCIRepository => "OCIRepository",
            DeliveryKind::HelmRepository => "HelmRepository",
            DeliveryKind::Bucket => "Bucket",
            DeliveryKind::HelmChart => "HelmChart",
            DeliveryKind::ExternalArtifact => "ExternalArtifact",
            DeliveryKind::Kustomization => "Kustomization",
            DeliveryKind::HelmRelease => "HelmRelease",
            DeliveryKind::Application => "Application",
        }
    }

    /// API group the kind is served from
    pub fn api_group(&self) -> &'static str {
        match self {
            DeliveryKind::GitRepository
            | DeliveryKind::OCIRepository
            | DeliveryKind::HelmRepository
            | DeliveryKind::Bucket
            | DeliveryKind::HelmChart
            | DeliveryKind::ExternalArtifact => "source.toolkit.fluxcd.io",
            DeliveryKind::Kustomization => "kustomize.toolkit.fluxcd.io",
            DeliveryKind::HelmRelease => "helm.toolkit.fluxcd.io",
            DeliveryKind::Application => "argoproj.io",
        }
    }

    pub fn role(&self) -> DeliveryRole {
        match self {
            DeliveryKind::GitRepository
            | DeliveryKind::OCIRepository
            | DeliveryKind::HelmRepository
            | DeliveryKind::Bucket => DeliveryRole::Source,
            DeliveryKind::HelmChart
            | DeliveryKind::ExternalArtifact
            | DeliveryKind::Kustomization
            | DeliveryKind::HelmRelease
            | DeliveryKind::Application => DeliveryRole::Deployer,
        }
    }

    /// Try to parse a kind string, returning None for kinds without a delivery convention
    pub fn parse_optional(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// Parse a kind and require its API group to match
    ///
    /// `Application` is a common kind name outside Argo CD, so the group is
    /// checked whenever the caller knows it.
    pub fn from_kind_and_group(kind: &str, api_group: &str) -> Option<Self> {
        let parsed = Self::parse_optional(kind)?;
        if api_group.is_empty() || parsed.api_group() == api_group {
            Some(parsed)
        } else {
            None
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            DeliveryKind::GitRepository,
            DeliveryKind::OCIRepository,
            DeliveryKind::HelmRepository,
            DeliveryKind::Bucket,
            DeliveryKind::HelmChart,
            DeliveryKind::ExternalArtifact,
            DeliveryKind::Kustomization,
            DeliveryKind::HelmRelease,
            DeliveryKind::Application,
        ]
    }
}

impl fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeliveryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown delivery kind: {}", s))
    }
}
