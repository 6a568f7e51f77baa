//! Main entry point for the redilock command line tool.

use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use redilock_cli::{Cli, Configuration, init_logging, run};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let configuration = Configuration::load(&cli)?;

    let _logging_guard = init_logging(&configuration.logging_config())
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    run(cli.command, &configuration).await
}
