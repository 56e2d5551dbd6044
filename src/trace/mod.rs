//! Provenance tracing
//!
//! Resolves the chain of layers that put an object into the cluster, from the
//! outermost source (a repository URL or registry coordinate) down to the
//! object itself. Similar to `flux trace`, but across Flux, Argo CD and the
//! tools that leave only markers behind.

mod core;
mod models;
mod registry;

pub use core::{DEFAULT_MAX_HOPS, ResolveOptions, Resolver, resolve};
pub use models::{
    Chain, ChainEnd, ChainLink, IncompleteReason, LinkOrigin, RegistryCoordinates, SourceMetadata,
};
pub use registry::{decode_registry_url, registry_host};
