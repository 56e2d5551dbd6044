//! OCI registry references
//!
//! ConfigHub publishes rendered targets to its own registry under
//! `oci://oci.<instance>.confighub.com/target/<space>/<target>`. Those URLs
//! are decoded into coordinates; any other OCI URL only records its host.

use url::Url;

use super::models::{RegistryCoordinates, SourceMetadata};

const REGISTRY_HOST_PREFIX: &str = "oci.";
const REGISTRY_HOST_SUFFIX: &str = ".confighub.com";
const TARGET_SEGMENT: &str = "target";

/// Host of an `oci://` URL
pub fn registry_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "oci" {
        return None;
    }
    parsed.host_str().map(str::to_string)
}

/// Decode a ConfigHub registry URL
///
/// Returns `None` for anything that does not follow the registry's layout.
pub fn decode_registry_url(url: &str) -> Option<RegistryCoordinates> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "oci" {
        return None;
    }

    let host = parsed.host_str()?.to_ascii_lowercase();
    let instance = host
        .strip_prefix(REGISTRY_HOST_PREFIX)?
        .strip_suffix(REGISTRY_HOST_SUFFIX)?;
    if instance.is_empty() {
        return None;
    }

    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [TARGET_SEGMENT, space, target] => Some(RegistryCoordinates {
            instance: instance.to_string(),
            space: space.to_string(),
            target: target.to_string(),
        }),
        _ => None,
    }
}

/// Fill registry fields of `meta` from an OCI URL, if it is one
pub fn annotate_registry(meta: &mut SourceMetadata, url: &str) {
    if let Some(host) = registry_host(url) {
        meta.registry_host = Some(host);
        meta.registry = decode_registry_url(url);
    }
}
