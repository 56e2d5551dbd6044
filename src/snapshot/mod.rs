//! Snapshot module
//!
//! Holds the immutable `SnapshotIndex` every analysis reads from, the label
//! selector evaluator used for lookups, and the `SnapshotSource` seam through
//! which a snapshot is obtained (live cluster, file on disk, or a test double).

mod index;
mod loader;
mod selector;

pub use index::SnapshotIndex;
pub use loader::{
    FileSnapshotSource, SnapshotError, load_snapshot, parse_snapshot, render_snapshot,
    save_snapshot,
};
pub use selector::{LabelSelector, Requirement, SelectorError, SelectorOperator};

use async_trait::async_trait;

/// Anything that can produce a consistent snapshot of the cluster
///
/// Implementations must hand back a complete index; analyses never observe a
/// partially-built one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Build a fresh snapshot
    async fn snapshot(&self) -> anyhow::Result<SnapshotIndex>;

    /// Human-readable description for logs and error messages
    fn describe(&self) -> String;
}
