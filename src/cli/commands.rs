//! CLI surface and command handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::output;
use crate::config::{self, Config, ConfigLoader, OutputFormat, paths};
use crate::models::ObjectKey;
use crate::ownership::OwnerType;
use crate::scan::{RULES, Scanner, Severity};
use crate::services::{MapFilter, ScoutService};
use crate::snapshot::{FileSnapshotSource, SnapshotSource, save_snapshot};
use crate::trace::ResolveOptions;

/// kscout - where did this object come from, and is its wiring intact?
#[derive(Parser, Debug)]
#[command(name = "kscout", version)]
#[command(about = "Trace Kubernetes objects to their delivery source and scan for dangling references", long_about = None)]
pub struct Args {
    /// Enable debug logging to a temp file
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Analyse a snapshot file instead of the live cluster
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Output format (overrides output.format)
    #[arg(long, short = 'o', global = true, value_enum)]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the delivery chain of one object
    Trace {
        /// Object kind (e.g. "deployment", "hr", "Kustomization")
        kind: String,
        /// Object name
        name: String,
        #[arg(long, short = 'n')]
        namespace: Option<String>,
        /// Continue through native controller owner references
        #[arg(long)]
        follow_owners: bool,
        /// Maximum number of objects visited above the traced one
        #[arg(long)]
        max_hops: Option<usize>,
    },
    /// Report dangling references between objects
    Scan {
        /// Only report findings on objects in this namespace
        #[arg(long, short = 'n')]
        namespace: Option<String>,
        /// Drop findings below this severity (info, warning, high, critical)
        #[arg(long)]
        min_severity: Option<Severity>,
        /// Skip a rule by id (repeatable)
        #[arg(long = "disable", value_name = "RULE")]
        disabled: Vec<String>,
        /// List the available rules and exit
        #[arg(long)]
        list_rules: bool,
    },
    /// Classify every object and show its state
    Map {
        #[arg(long, short = 'n')]
        namespace: Option<String>,
        /// Only objects of this kind
        #[arg(long)]
        kind: Option<String>,
        /// Only objects managed by this tool (flux, argo, helm, terraform, confighub, kubernetes, unknown)
        #[arg(long)]
        owner: Option<OwnerType>,
    },
    /// Write the current cluster state to a snapshot file
    Snapshot {
        /// Output file
        out: PathBuf,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "trace.maxHops", "output.format")
        key: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "trace.maxHops", "output.format")
        key: String,
        /// Configuration value
        value: String,
        /// Context name for context-specific config
        #[arg(long = "for-context")]
        for_context: Option<String>,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Run a parsed command line
pub async fn run(args: Args) -> Result<()> {
    let context = args.context.clone().or_else(crate::kube::current_context);

    let command = match args.command {
        Command::Config { subcommand } => {
            return handle_config_command(subcommand, context.as_deref());
        }
        Command::Scan {
            list_rules: true, ..
        } => {
            for rule in RULES {
                println!("{:<34} {:<8} {}", rule.id, rule.severity.as_str(), rule.description);
            }
            return Ok(());
        }
        command => command,
    };

    let config = ConfigLoader::load(context.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Failed to load configuration, using defaults: {:#}", e);
        ConfigLoader::load_defaults()
    });
    let format = args.output.unwrap_or(config.output.format);

    match args.snapshot.clone().or_else(|| config.snapshot.path.clone()) {
        Some(path) => {
            tracing::debug!("Reading snapshot file {}", path.display());
            let service = ScoutService::new(FileSnapshotSource::new(path));
            run_command(&service, command, &config, format).await
        }
        None => {
            let client = crate::kube::create_client(args.context.as_deref()).await?;
            let source = crate::kube::LiveSnapshotSource::new(client).with_context(context);
            let service = ScoutService::new(source);
            run_command(&service, command, &config, format).await
        }
    }
}

async fn run_command<S: SnapshotSource>(
    service: &ScoutService<S>,
    command: Command,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Command::Trace {
            kind,
            name,
            namespace,
            follow_owners,
            max_hops,
        } => {
            let target = trace_target(&kind, &name, namespace, config);
            let options = ResolveOptions {
                max_hops: max_hops.unwrap_or(config.trace.max_hops),
                follow_owner_references: follow_owners || config.trace.follow_owner_references,
            };
            if options.max_hops == 0 {
                return Err(anyhow::anyhow!("--max-hops must be at least 1"));
            }

            let chain = service.trace(&target, options).await?;
            print!("{}", output::chain(&chain, format)?);
        }
        Command::Scan {
            namespace,
            min_severity,
            disabled,
            ..
        } => {
            let mut scanner = Scanner::new()
                .disable_all(config.scan.disabled_rules.iter().chain(disabled.iter()))
                .min_severity(min_severity.unwrap_or(config.scan.min_severity));
            if let Some(ns) = namespace.or_else(|| non_empty(&config.default_namespace)) {
                scanner = scanner.namespace(ns);
            }

            let findings = service.scan(&scanner).await?;
            print!("{}", output::findings(&findings, format)?);
        }
        Command::Map {
            namespace,
            kind,
            owner,
        } => {
            let filter = MapFilter {
                namespace: namespace.or_else(|| non_empty(&config.default_namespace)),
                kind: kind.map(|k| canonical_kind(&k)),
                owner,
            };
            let entries = service.map(&filter).await?;
            print!("{}", output::map(&entries, format)?);
        }
        Command::Snapshot { out } => {
            let index = service.snapshot().await?;
            save_snapshot(&index, &out)?;
            eprintln!("Wrote {} objects to {}", index.len(), out.display());
        }
        Command::Config { subcommand } => handle_config_command(subcommand, None)?,
    }

    Ok(())
}

/// Resolve user input into the key of the object to trace
fn trace_target(kind: &str, name: &str, namespace: Option<String>, config: &Config) -> ObjectKey {
    let entry = crate::kube::find_kind(kind);
    let kind = entry.map(|e| e.kind.to_string()).unwrap_or_else(|| kind.to_string());
    let namespace = if entry.is_some_and(|e| !e.namespaced) {
        String::new()
    } else {
        namespace
            .or_else(|| non_empty(&config.default_namespace))
            .unwrap_or_else(|| "default".to_string())
    };
    ObjectKey::new(kind, namespace, name)
}

fn canonical_kind(kind: &str) -> String {
    crate::kube::find_kind(kind)
        .map(|e| e.kind.to_string())
        .unwrap_or_else(|| kind.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand, context: Option<&str>) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load(context).context("Failed to load configuration")?;

            if let Some(key) = key {
                println!("{}", config::get_config_value(&config, &key)?);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Set {
            key,
            value,
            for_context,
        } => {
            // Only the file being written is loaded, so values inherited from
            // other layers are not copied into it
            let path = match &for_context {
                Some(ctx) => paths::context_config_path(ctx),
                None => paths::root_config_path(),
            };
            let mut config = if path.exists() {
                ConfigLoader::load_file(&path)?
            } else {
                ConfigLoader::load_defaults()
            };

            config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;

            match for_context {
                Some(ctx) => {
                    ConfigLoader::save_context(&config, &ctx)
                        .context("Failed to save context configuration")?;
                    println!("Configuration saved for context: {}", ctx);
                }
                None => {
                    ConfigLoader::save_root(&config).context("Failed to save configuration")?;
                    println!("Configuration saved");
                }
            }
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load(context).context("Failed to load configuration")?;
            for key in config::CONFIG_KEYS {
                println!("{} = {}", key, config::get_config_value(&config, key)?);
            }
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
            if let Some(ctx) = context {
                println!("{}", paths::context_config_path(ctx).display());
            }
        }
        ConfigSubcommand::Validate => match ConfigLoader::validate(context) {
            Ok(_) => println!("Configuration is valid"),
            Err(e) => {
                eprintln!("Configuration validation failed: {:#}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_flags() {
        let args = Args::parse_from([
            "kscout",
            "scan",
            "-n",
            "shop",
            "--min-severity",
            "high",
            "--disable",
            "hpa-target-missing",
            "--disable",
            "pdb-blocks-eviction",
            "-o",
            "json",
        ]);
        assert_eq!(args.output, Some(OutputFormat::Json));
        match args.command {
            Command::Scan {
                namespace,
                min_severity,
                disabled,
                ..
            } => {
                assert_eq!(namespace.as_deref(), Some("shop"));
                assert_eq!(min_severity, Some(Severity::High));
                assert_eq!(disabled.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_trace_target_uses_registry() {
        let config = Config::default();
        assert_eq!(
            trace_target("deploy", "web", Some("shop".to_string()), &config),
            ObjectKey::new("Deployment", "shop", "web")
        );
        assert_eq!(
            trace_target("Widget", "w", None, &config),
            ObjectKey::new("Widget", "default", "w")
        );

        let config = Config {
            default_namespace: "apps".to_string(),
            ..Config::default()
        };
        assert_eq!(trace_target("hr", "podinfo", None, &config).namespace, "apps");
    }
}
