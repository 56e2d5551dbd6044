//! Kubernetes client module
//!
//! Handles connection to the Kubernetes API server and builds live snapshots
//! by listing every tracked kind in parallel.
//!
//! Supports HTTP/HTTPS proxy configuration from kubeconfig (`proxy-url`).
//! Internal cluster hosts that are not covered by `NO_PROXY` bypass the proxy,
//! which avoids proxy issues in corporate environments.

mod registry;
mod snapshot;

pub use registry::{KIND_REGISTRY, KindEntry, find_kind};
pub use snapshot::LiveSnapshotSource;

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use url::Url;

/// Initialize and return a Kubernetes client
///
/// With no context, uses the default loading strategy:
/// 1. In-cluster config (if running in a pod)
/// 2. KUBECONFIG environment variable
/// 3. ~/.kube/config
///
/// With a context, that kubeconfig context is used instead of the current one.
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let mut config = match context {
        Some(name) => {
            let options = KubeConfigOptions {
                context: Some(name.to_string()),
                ..KubeConfigOptions::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context {}", name))?
        }
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    let cluster_url = config.cluster_url.to_string();
    if let Some(host) = Url::parse(&cluster_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
    {
        if config.proxy_url.is_some() && should_bypass_proxy(&host) {
            tracing::debug!("Bypassing proxy for internal cluster host {}", host);
            config.proxy_url = None;
        }
    }

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Name of the kubeconfig context in use
pub fn current_context() -> Option<String> {
    match Kubeconfig::read() {
        Ok(kubeconfig) => kubeconfig.current_context,
        Err(e) => {
            tracing::debug!("Could not read kubeconfig: {}", e);
            None
        }
    }
}

/// True when `host` is internal and `NO_PROXY` does not already cover it
fn should_bypass_proxy(host: &str) -> bool {
    if !is_internal_host(host) {
        return false;
    }

    // NO_PROXY takes precedence over no_proxy
    let no_proxy = std::env::var("NO_PROXY")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var("no_proxy").ok())
        .unwrap_or_default();

    !no_proxy_contains(&no_proxy, host)
}

/// Heuristic for private cluster endpoints: private IPs, loopback, and
/// internal-looking domains
fn is_internal_host(host: &str) -> bool {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return match ip {
            std::net::IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
            std::net::IpAddr::V6(v6) => v6.is_loopback(),
        };
    }
    if host == "localhost" {
        return true;
    }

    const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".corp", ".int"];
    const INTERNAL_PREFIXES: &[&str] = &["dev", "test", "staging", "qa", "uat", "internal"];

    if INTERNAL_SUFFIXES.iter().any(|s| host.ends_with(s)) {
        return true;
    }

    // Any label except the TLD starting with an environment prefix
    let labels: Vec<&str> = host.split('.').collect();
    labels
        .iter()
        .take(labels.len().saturating_sub(1))
        .any(|label| INTERNAL_PREFIXES.iter().any(|p| label.starts_with(p)))
}

/// Check if a NO_PROXY list covers `host`
///
/// `example.com` and `.example.com` both cover the domain and its subdomains.
fn no_proxy_contains(no_proxy: &str, host: &str) -> bool {
    no_proxy
        .split(',')
        .map(|s| s.trim().trim_start_matches('.'))
        .filter(|s| !s.is_empty())
        .any(|pattern| {
            pattern == "*" || host == pattern || host.ends_with(&format!(".{}", pattern))
        })
}
