//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules. Files are merged as YAML documents before
//! deserializing, so a context file only needs the keys it changes.

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::Path;

use super::{defaults, paths, schema::Config};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Context-specific config
    /// 3. Root config
    /// 4. Built-in defaults
    pub fn load(context: Option<&str>) -> Result<Config> {
        let mut merged = serde_yaml::to_value(Self::load_defaults())
            .context("Failed to serialize default configuration")?;

        let mut layers = vec![paths::root_config_path()];
        if let Some(context_name) = context {
            layers.push(paths::context_config_path(context_name));
        }

        for path in layers {
            if let Some(layer) = Self::load_layer(&path)? {
                tracing::debug!("Merging configuration from {}", path.display());
                merge_values(&mut merged, layer);
            }
        }

        let config: Config =
            serde_yaml::from_value(merged).context("Failed to apply configuration layers")?;
        Ok(Self::apply_env_overrides(config))
    }

    /// Read one layer as a raw YAML document; missing files are not an error
    fn load_layer(path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Load a configuration file on its own
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate configuration by loading and checking for errors
    ///
    /// Fails on invalid YAML, invalid value types, unknown scan rules, and a
    /// zero hop bound.
    pub fn validate(context: Option<&str>) -> Result<Config> {
        let config = Self::load(context).context("Failed to load merged configuration")?;

        if config.trace.max_hops == 0 {
            return Err(anyhow::anyhow!("trace.maxHops must be at least 1"));
        }
        for rule in &config.scan.disabled_rules {
            if crate::scan::find_rule(rule).is_none() {
                return Err(anyhow::anyhow!(
                    "scan.disabledRules contains unknown rule: {}",
                    rule
                ));
            }
        }

        Ok(config)
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config) -> Config {
        // KSCOUT_MAX_HOPS override
        if let Ok(hops) = std::env::var("KSCOUT_MAX_HOPS") {
            match hops.parse() {
                Ok(val) => config.trace.max_hops = val,
                Err(_) => tracing::warn!("Ignoring invalid KSCOUT_MAX_HOPS: {}", hops),
            }
        }

        // KSCOUT_OUTPUT override
        if let Ok(format) = std::env::var("KSCOUT_OUTPUT") {
            match format.parse() {
                Ok(val) => config.output.format = val,
                Err(e) => tracing::warn!("Ignoring KSCOUT_OUTPUT: {}", e),
            }
        }

        // KSCOUT_MIN_SEVERITY override
        if let Ok(severity) = std::env::var("KSCOUT_MIN_SEVERITY") {
            match severity.parse() {
                Ok(val) => config.scan.min_severity = val,
                Err(e) => tracing::warn!("Ignoring KSCOUT_MIN_SEVERITY: {}", e),
            }
        }

        // KSCOUT_DEFAULT_NAMESPACE override
        if let Ok(namespace) = std::env::var("KSCOUT_DEFAULT_NAMESPACE") {
            config.default_namespace = namespace;
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }

    /// Save context-specific configuration
    pub fn save_context(config: &Config, context: &str) -> Result<()> {
        Self::save(config, &paths::context_config_path(context))
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, everything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::scan::Severity;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.trace.max_hops, 16);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_merge_keeps_unset_keys() {
        let mut base = serde_yaml::to_value(Config::default()).unwrap();
        let overlay: Value = serde_yaml::from_str("trace:\n  followOwnerReferences: true\n").unwrap();
        merge_values(&mut base, overlay);

        let config: Config = serde_yaml::from_value(base).unwrap();
        assert!(config.trace.follow_owner_references);
        assert_eq!(config.trace.max_hops, 16);
    }

    #[test]
    fn test_env_overrides() {
        // SAFETY: set_var is unsafe in Rust 2024 due to potential data races.
        // These variables are only read by this test.
        unsafe {
            std::env::set_var("KSCOUT_MAX_HOPS", "3");
            std::env::set_var("KSCOUT_MIN_SEVERITY", "high");
            std::env::set_var("KSCOUT_OUTPUT", "bogus");
        }

        let config = ConfigLoader::apply_env_overrides(Config::default());

        assert_eq!(config.trace.max_hops, 3);
        assert_eq!(config.scan.min_severity, Severity::High);
        assert_eq!(config.output.format, OutputFormat::Text);

        // SAFETY: see above
        unsafe {
            std::env::remove_var("KSCOUT_MAX_HOPS");
            std::env::remove_var("KSCOUT_MIN_SEVERITY");
            std::env::remove_var("KSCOUT_OUTPUT");
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.default_namespace = "shop".to_string();

        ConfigLoader::save(&config, &path).unwrap();
        assert_eq!(ConfigLoader::load_file(&path).unwrap(), config);
    }
}
