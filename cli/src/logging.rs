use crate::error::CliError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) -> Result<(), CliError> {
    let default_level = if verbose {
        "debug"
    } else {
        "warn,goose_desktop_client=info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| CliError::Config(format!("Failed to create log filter: {}", e)))?;

    // stdout carries the chat transcript
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CliError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
