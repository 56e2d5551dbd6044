//! kscout - trace Kubernetes objects to their delivery source and scan for
//! dangling references

use anyhow::Result;
use clap::Parser;
use kscout::cli::{self, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = cli::init_logging(args.debug);
    if let Some(ref log_path) = log_file {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    cli::run(args).await
}
