//! Provisioning-CLI collaborator: issues generated command strings.

use anyhow::{Context, Result};
use std::process::Command;

/// Destination for generated command strings. The batch processor only
/// depends on this seam, so tests record commands instead of spawning.
pub trait CommandSink {
    /// Run every command in order. Returns whether the final command's
    /// output contained the running-status marker.
    fn run(&mut self, commands: &[String]) -> Result<bool>;
}

/// Marker the ztp CLI prints when the service is up after a restart.
const RUNNING_MARKER: &str = "(running)";

/// Executes commands against the local ztp CLI.
#[derive(Debug, Default)]
pub struct ZtpCli;

impl CommandSink for ZtpCli {
    fn run(&mut self, commands: &[String]) -> Result<bool> {
        let mut last_output = String::new();
        for command in commands {
            let argv = shell_words::split(command)
                .with_context(|| format!("tokenize command: {command}"))?;
            let Some((program, args)) = argv.split_first() else {
                continue;
            };
            let output = Command::new(program)
                .args(args)
                .output()
                .with_context(|| format!("run {program}"))?;
            last_output = String::from_utf8_lossy(&output.stdout).into_owned();
            tracing::debug!(%command, "issued ztp command");
        }
        // The last command restarts ztp; its status line decides success.
        Ok(last_output.contains(RUNNING_MARKER))
    }
}
