//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scan::Severity;
use crate::trace::DEFAULT_MAX_HOPS;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Namespace used when a command is not given one (empty means all)
    #[serde(default)]
    pub default_namespace: String,

    /// Chain resolution settings
    #[serde(default)]
    pub trace: TraceConfig,

    /// Scanner settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Offline snapshot settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Chain resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
    /// Maximum number of objects visited above the traced one
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Continue through native controller owner references
    #[serde(default = "default_false")]
    pub follow_owner_references: bool,
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// Findings below this severity are not reported
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,

    /// Rule ids that never run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_rules: Vec<String>,
}

/// How command results are printed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {} (expected text or json)", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Offline snapshot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotConfig {
    /// Read this snapshot file instead of connecting to a cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// Default value functions
fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

fn default_false() -> bool {
    false
}

fn default_min_severity() -> Severity {
    Severity::Info
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            follow_owner_references: default_false(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_severity: default_min_severity(),
            disabled_rules: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(config.default_namespace.is_empty());
        assert_eq!(config.trace.max_hops, 16);
        assert!(!config.trace.follow_owner_references);
        assert_eq!(config.scan.min_severity, Severity::Info);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_config_serialization() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("defaultNamespace"));
        assert!(yaml.contains("maxHops"));
        assert!(yaml.contains("followOwnerReferences"));
        assert!(yaml.contains("minSeverity: info"));
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
defaultNamespace: shop
trace:
  maxHops: 4
scan:
  minSeverity: high
  disabledRules: [hpa-target-missing]
output:
  format: json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_namespace, "shop");
        assert_eq!(config.trace.max_hops, 4);
        assert!(!config.trace.follow_owner_references);
        assert_eq!(config.scan.min_severity, Severity::High);
        assert_eq!(config.scan.disabled_rules, vec!["hpa-target-missing"]);
        assert_eq!(config.output.format, OutputFormat::Json);
    }
}
