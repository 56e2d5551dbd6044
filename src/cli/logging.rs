//! Logging initialization

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize logging
///
/// With `debug`, everything at debug level goes to a temp file so command
/// output on stdout stays clean; the file path is returned for the caller to
/// print. Otherwise warnings go to stderr. `RUST_LOG` overrides either level.
pub fn init_logging(debug: bool) -> Option<PathBuf> {
    if !debug {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter("warn"))
            .with_target(false)
            .init();
        return None;
    }

    // Named temp file that outlives this function; the OS cleans the temp dir
    let log_path = tempfile::Builder::new()
        .prefix("kscout-")
        .suffix(".log")
        .tempfile()
        .ok()
        .and_then(|f| f.into_temp_path().keep().ok())
        .unwrap_or_else(|| std::env::temp_dir().join(format!("kscout-{}.log", std::process::id())));

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {}: {}, logging to stderr", log_path.display(), e);
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter("debug"))
                .init();
            return None;
        }
    };

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_env_filter(env_filter("debug"))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Some(log_path)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
