//! CLI command handling module
//!
//! Argument parsing, command dispatch, logging setup and result rendering.

mod commands;
mod logging;
pub mod output;

pub use commands::{Args, Command, ConfigSubcommand, handle_config_command, run};
pub use logging::init_logging;
