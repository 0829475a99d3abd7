//! kvlog HTTP server binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kvlog::Log;
use kvlog::server::{CliArgs, LogServer, LogServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let log_config = match args.to_log_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let server_config = LogServerConfig::from(&args);

    tracing::info!("Opening log with config: {:?}", log_config);

    let log = match Log::open(log_config).await {
        Ok(log) => log,
        Err(e) => {
            tracing::error!(error = %e, "failed to open log");
            return ExitCode::FAILURE;
        }
    };

    let server = LogServer::new(Arc::new(log), server_config);
    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
