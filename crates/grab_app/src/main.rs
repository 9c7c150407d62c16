mod cli;
mod commands;
mod logging;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    // A missing .env is normal; the environment may already hold the credentials.
    let _ = dotenvy::dotenv();
    logging::initialize(cli.log_file.clone(), cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;

    match cli.command {
        Command::Get(args) => runtime.block_on(commands::get(args, &cli.data_dir)),
        Command::Resolve(args) => runtime.block_on(commands::resolve(args, &cli.data_dir)),
        Command::History(args) => commands::history(args, &cli.data_dir),
    }
}
