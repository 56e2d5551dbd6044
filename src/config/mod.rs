//! Configuration system for kscout
//!
//! Layered YAML configuration: built-in defaults, the root config file, an
//! optional per-context file, then environment overrides.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, OutputConfig, OutputFormat, ScanConfig, SnapshotConfig, TraceConfig};

use anyhow::Context;
use std::path::PathBuf;

/// Every key `config get`/`config set` understands
pub const CONFIG_KEYS: &[&str] = &[
    "defaultNamespace",
    "trace.maxHops",
    "trace.followOwnerReferences",
    "scan.minSeverity",
    "scan.disabledRules",
    "output.format",
    "snapshot.path",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "defaultNamespace" => Ok(config.default_namespace.clone()),
        "trace.maxHops" => Ok(config.trace.max_hops.to_string()),
        "trace.followOwnerReferences" => Ok(config.trace.follow_owner_references.to_string()),
        "scan.minSeverity" => Ok(config.scan.min_severity.to_string()),
        "scan.disabledRules" => Ok(config.scan.disabled_rules.join(",")),
        "output.format" => serde_yaml::to_string(&config.output.format)
            .map(|s| s.trim().to_string())
            .context("Failed to serialize output.format"),
        "snapshot.path" => Ok(config
            .snapshot
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "defaultNamespace" => {
            config.default_namespace = value.to_string();
        }
        "trace.maxHops" => {
            let hops: usize = value
                .parse()
                .context("trace.maxHops must be a positive number")?;
            if hops == 0 {
                return Err(anyhow::anyhow!("trace.maxHops must be at least 1"));
            }
            config.trace.max_hops = hops;
        }
        "trace.followOwnerReferences" => {
            config.trace.follow_owner_references = value
                .parse()
                .context("trace.followOwnerReferences must be 'true' or 'false'")?;
        }
        "scan.minSeverity" => {
            config.scan.min_severity = value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        }
        "scan.disabledRules" => {
            let rules: Vec<String> = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if let Some(unknown) = rules.iter().find(|r| crate::scan::find_rule(r).is_none()) {
                return Err(anyhow::anyhow!("Unknown scan rule: {}", unknown));
            }
            config.scan.disabled_rules = rules;
        }
        "output.format" => {
            config.output.format = value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        }
        "snapshot.path" => {
            config.snapshot.path = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}
