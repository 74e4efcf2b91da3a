mod cli;
mod commands;
mod config;
mod dom;
mod error;
mod ids;
mod model;
mod numbering;
mod outline;
mod pipeline;
mod toc;
mod util;
mod vocab;
mod xref;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::error::ProcessError;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        let kind = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<ProcessError>())
            .map_or("internal", ProcessError::kind);
        error!(error = %err, kind, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => commands::process::run(args),
        Commands::Outline(args) => commands::outline::run(args),
        Commands::Terms(args) => commands::terms::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
