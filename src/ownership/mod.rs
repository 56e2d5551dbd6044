//! Ownership classification
//!
//! Answers "who manages this object?" from the markers management tools leave
//! behind. Several tools commonly stamp the same object (Flux applies Helm
//! charts, Argo CD renders Helm templates), so detection is an ordered table of
//! detectors and the first match wins, independent of how many other markers
//! are present.
//!
//! Classification is total: objects without any marker are `Unknown`, which is
//! an expected outcome and not an error.

mod detectors;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::models::ClusterObject;

pub use detectors::{DETECTORS, Detector};

/// Management convention that owns an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OwnerType {
    Flux,
    Argo,
    Helm,
    Terraform,
    ConfigHub,
    Kubernetes,
    Unknown,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Flux => "Flux",
            OwnerType::Argo => "Argo",
            OwnerType::Helm => "Helm",
            OwnerType::Terraform => "Terraform",
            OwnerType::ConfigHub => "ConfigHub",
            OwnerType::Kubernetes => "Kubernetes",
            OwnerType::Unknown => "Unknown",
        }
    }

    /// True for tools that deploy through an in-cluster controller object
    pub fn has_controller_object(&self) -> bool {
        matches!(self, OwnerType::Flux | OwnerType::Argo)
    }

    pub fn all() -> &'static [Self] {
        &[
            OwnerType::Flux,
            OwnerType::Argo,
            OwnerType::Helm,
            OwnerType::Terraform,
            OwnerType::ConfigHub,
            OwnerType::Kubernetes,
            OwnerType::Unknown,
        ]
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flux" => Ok(OwnerType::Flux),
            "argo" | "argocd" => Ok(OwnerType::Argo),
            "helm" => Ok(OwnerType::Helm),
            "terraform" => Ok(OwnerType::Terraform),
            "confighub" => Ok(OwnerType::ConfigHub),
            "kubernetes" | "native" | "k8s" => Ok(OwnerType::Kubernetes),
            "unknown" => Ok(OwnerType::Unknown),
            _ => Err(format!("Unknown owner type: {}", s)),
        }
    }
}

/// Result of classifying one object
///
/// `name`/`namespace` identify the owning entity, not the object itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipResult {
    #[serde(rename = "type")]
    pub owner_type: OwnerType,
    pub sub_type: String,
    pub name: String,
    pub namespace: String,
}

impl OwnershipResult {
    pub fn new(
        owner_type: OwnerType,
        sub_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            owner_type,
            sub_type: sub_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(OwnerType::Unknown, "", "", "")
    }

    pub fn is_unknown(&self) -> bool {
        self.owner_type == OwnerType::Unknown
    }
}

impl fmt::Display for OwnershipResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("Unknown");
        }
        write!(f, "{}", self.owner_type)?;
        if !self.sub_type.is_empty() {
            write!(f, " {}", self.sub_type)?;
        }
        match (self.namespace.is_empty(), self.name.is_empty()) {
            (_, true) => Ok(()),
            (true, false) => write!(f, " {}", self.name),
            (false, false) => write!(f, " {}/{}", self.namespace, self.name),
        }
    }
}

/// Classify an object's owner
///
/// Pure and total: detectors run in priority order and the first match wins.
pub fn classify(obj: &ClusterObject) -> OwnershipResult {
    DETECTORS
        .iter()
        .find_map(|detector| (detector.detect)(obj))
        .unwrap_or_else(OwnershipResult::unknown)
}
