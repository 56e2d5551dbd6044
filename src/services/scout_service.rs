//! Scout service
//!
//! Fetches one snapshot from a `SnapshotSource` per call and runs an analysis
//! over it. Everything below this layer is pure; this is where fetch failures
//! and user-supplied names turn into errors.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::ObjectKey;
use crate::ownership::{self, OwnerType, OwnershipResult};
use crate::scan::{Finding, Scanner};
use crate::snapshot::{SnapshotIndex, SnapshotSource};
use crate::status::{self, StatusDetail};
use crate::trace::{Chain, ResolveOptions, Resolver};

/// Which objects `map` reports on
#[derive(Debug, Clone, Default)]
pub struct MapFilter {
    pub namespace: Option<String>,
    pub kind: Option<String>,
    pub owner: Option<OwnerType>,
}

impl MapFilter {
    fn accepts(&self, key: &ObjectKey, owner: &OwnershipResult) -> bool {
        self.namespace.as_deref().is_none_or(|ns| key.namespace == ns)
            && self
                .kind
                .as_deref()
                .is_none_or(|kind| key.kind.eq_ignore_ascii_case(kind))
            && self.owner.is_none_or(|t| owner.owner_type == t)
    }
}

/// Classification and status of one object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapEntry {
    pub object: ObjectKey,
    pub owner: OwnershipResult,
    pub status: StatusDetail,
}

/// Runs trace, scan and map against snapshots from `S`
pub struct ScoutService<S: SnapshotSource> {
    source: S,
}

impl<S: SnapshotSource> ScoutService<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch a fresh snapshot
    pub async fn snapshot(&self) -> Result<SnapshotIndex> {
        let index = self
            .source
            .snapshot()
            .await
            .with_context(|| format!("Failed to take snapshot from {}", self.source.describe()))?;
        tracing::debug!(
            "Snapshot from {} holds {} objects",
            self.source.describe(),
            index.len()
        );
        Ok(index)
    }

    /// Resolve the provenance chain of one object
    pub async fn trace(&self, target: &ObjectKey, options: ResolveOptions) -> Result<Chain> {
        let index = self.snapshot().await?;
        Self::trace_in(&index, target, options)
    }

    /// Resolve against an already captured snapshot
    pub fn trace_in(
        index: &SnapshotIndex,
        target: &ObjectKey,
        options: ResolveOptions,
    ) -> Result<Chain> {
        let obj = index
            .get_key(target)
            .or_else(|| find_case_insensitive(index, target))
            .with_context(|| format!("{} not found in snapshot", target))?;

        Ok(Resolver::new(index).with_options(options).resolve(obj))
    }

    /// Run the structural scan
    pub async fn scan(&self, scanner: &Scanner) -> Result<Vec<Finding>> {
        let index = self.snapshot().await?;
        Ok(scanner.scan(&index))
    }

    /// Classify and infer status for every object the filter accepts
    ///
    /// Entries are ordered by object key.
    pub async fn map(&self, filter: &MapFilter) -> Result<Vec<MapEntry>> {
        let index = self.snapshot().await?;
        Ok(map_index(&index, filter))
    }
}

pub fn map_index(index: &SnapshotIndex, filter: &MapFilter) -> Vec<MapEntry> {
    let mut entries: Vec<MapEntry> = index
        .objects()
        .iter()
        .filter_map(|obj| {
            let object = obj.key();
            let owner = ownership::classify(obj);
            filter.accepts(&object, &owner).then(|| MapEntry {
                object,
                owner,
                status: status::describe(obj),
            })
        })
        .collect();
    entries.sort_by(|a, b| a.object.cmp(&b.object));
    entries
}

/// Users type kinds in any case (`deployment`, `Deployment`)
fn find_case_insensitive<'a>(
    index: &'a SnapshotIndex,
    target: &ObjectKey,
) -> Option<&'a crate::models::ClusterObject> {
    index.objects().iter().find(|obj| {
        obj.kind.eq_ignore_ascii_case(&target.kind)
            && obj.namespace == target.namespace
            && obj.name == target.name
    })
}
