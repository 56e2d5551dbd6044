//! kscout library
//!
//! Provenance and structural-integrity analysis for Kubernetes clusters:
//! which tool manages an object, what state it is in, which chain of
//! delivery objects it came from, and which cross-references are dangling.
//! Every analysis reads an immutable `SnapshotIndex`; the `kube` module
//! builds one from a live cluster and `snapshot` reads one from disk.

pub mod cli;
pub mod config;
pub mod kube;
pub mod models;
pub mod ownership;
pub mod scan;
pub mod services;
pub mod snapshot;
pub mod status;
pub mod trace;

// Re-export commonly used types for convenience
pub use models::{ClusterObject, ObjectKey, OwnerReference};
pub use ownership::{OwnerType, OwnershipResult, classify};
pub use scan::{Finding, Scanner, Severity, scan};
pub use snapshot::{LabelSelector, SnapshotIndex, SnapshotSource};
pub use status::{StatusDetail, StatusState, describe, infer};
pub use trace::{Chain, ChainEnd, ChainLink, resolve};
