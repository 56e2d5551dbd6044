//! Service layer
//!
//! Sits between the CLI and the pure analyses: obtains a snapshot through a
//! `SnapshotSource` and hands it to the ownership, trace and scan engines.

pub mod scout_service;

pub use scout_service::{MapEntry, MapFilter, ScoutService, map_index};
