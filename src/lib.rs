pub mod cli;
pub mod config;
pub mod config_store;
pub mod editor;
pub mod error;
pub mod gateway;
pub mod segments;
pub mod session;
pub mod sync;
pub mod view;
pub mod waveform;

use clap::Parser;
pub use error::DeskError;
use tracing_subscriber::EnvFilter;

/// Log filter variable; falls back to `warn` so terminal output stays readable
pub const LOG_ENV: &str = "DESK_LOG";

pub fn run() -> Result<(), DeskError> {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();
    init_logging()?;

    let cli = cli::Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::execute(cli))
}

fn init_logging() -> Result<(), DeskError> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| DeskError::LoggingInit(err.to_string()))
}
