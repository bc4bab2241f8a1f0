//! WebForms CLI entry point

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use webforms_cli::{AppConfig, Cli, CommandDispatcher};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(key) = &cli.hash_key {
        config.view_state.hash_key = Some(key.clone());
    }
    config.validate().context("validating configuration")?;

    setup_logging(cli.verbose, &config.log.level);

    let output = CommandDispatcher::execute(&cli, &config).context("command failed")?;
    println!("{}", output);
    Ok(())
}

/// Log to stderr so rendered pages on stdout stay clean
fn setup_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
