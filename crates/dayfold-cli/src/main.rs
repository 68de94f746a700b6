//! The main entry point for the `dayfold` CLI binary.

use anyhow::Result;
use clap::Parser;

use dayfold_cli::{Cli, Commands};
use dayfold_core::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format.into());

    let config = cli.config();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Apply(args) => dayfold_cli::commands::apply::execute(args, &config).await,
            Commands::Check(args) => dayfold_cli::commands::check::execute(&args, &config),
        }
    })
}
