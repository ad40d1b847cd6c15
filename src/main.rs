use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod batch;
mod cli;
mod commands;
mod config;
mod exec;
mod extract;
mod forms;
mod keystore;
mod mapping;
mod notify;

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_tracing(args.verbose, args.debug);

    if args.setup {
        config::write_template(&args.config)?;
        println!(
            "Wrote settings template to {}. Fill it in before the first run.",
            args.config.display()
        );
        return Ok(());
    }

    let settings = config::Settings::load(&args.config)?;
    let forms = forms::JotformClient::new(&settings);
    let mut sink = exec::ZtpCli;

    let summary = batch::run(&settings, &forms, &mut sink, args.dry_run)?;
    tracing::info!(
        fetched = summary.fetched,
        resolved = summary.resolved,
        commands = summary.commands_issued,
        marked_read = summary.marked_read,
        "run complete"
    );
    Ok(())
}

fn init_tracing(verbose: bool, debug: bool) {
    let default_level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
