//! `hostengine` entry point - the composition root of the binary.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use hostengine_cli::{Cli, init_tracing, load_env_files, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dotenv first so clap sees the variables through its `env` fallbacks.
    load_env_files();

    let config = Cli::parse().into_config();
    init_tracing(&config.log_level);

    config.validate().context("Invalid configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_addr(),
        "Starting hostengine"
    );

    hostengine_axum::start_server(config, shutdown_signal()).await
}
