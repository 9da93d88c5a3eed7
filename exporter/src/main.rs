//! Loki Exporter Binary
//!
//! Entry point for the Loki exporter.

#![deny(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use exporter::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    exporter::run_server(config).await
}
