//! CLI argument parsing for the batch runner.
//!
//! The surface is intentionally thin: pick a settings file, choose setup vs.
//! run mode, set console verbosity. All processing policy lives in the
//! settings file, not in flags.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "formztp",
    version,
    about = "Sync form submissions into freeZTP keystores",
    after_help = "Examples:\n  formztp --setup\n  formztp --verbose\n  formztp --config /etc/formztp/datamap.json"
)]
pub struct RootArgs {
    /// Path to the settings file
    #[arg(long, value_name = "PATH", default_value = "datamap.json")]
    pub config: PathBuf,

    /// Write a settings template to the config path and exit
    #[arg(short, long)]
    pub setup: bool,

    /// Print informational messages to console
    #[arg(short, long)]
    pub verbose: bool,

    /// Print debug messages to console
    #[arg(short, long)]
    pub debug: bool,

    /// Process submissions without executing commands or marking them read
    #[arg(short = 't', long = "test", hide = true)]
    pub dry_run: bool,
}
