use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod cli;
mod commands;
mod error;
mod logging;

use cli::Cli;
use error::CliError;
use logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    debug!("CLI arguments: {:?}", cli);

    match cli.run().await {
        Ok(_) => {
            info!("goose-desktop completed");
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            tracing::error!("CLI error: {:?}", e);
            std::process::exit(e.exit_code());
        }
    }
}
