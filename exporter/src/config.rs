//! Process configuration module.
//!
//! Handles the command-line flags of the exporter. Every flag can also be set
//! through an environment variable.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Loki exporter - exposes label and query statistics of Loki as Prometheus metrics
#[derive(Debug, Clone, Parser)]
#[command(name = "loki_exporter")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address to listen on for web interface and telemetry
    #[arg(
        long = "web.listen-address",
        env = "LOKI_EXPORTER_LISTEN_ADDRESS",
        default_value = ":9524",
        value_parser = parse_listen_address
    )]
    pub listen_address: SocketAddr,

    /// Path under which to expose metrics
    #[arg(
        long = "web.telemetry-path",
        env = "LOKI_EXPORTER_TELEMETRY_PATH",
        default_value = "/metrics",
        value_parser = parse_metrics_path
    )]
    pub metrics_path: String,

    /// Configuration file in YAML format
    #[arg(
        long = "config.file",
        env = "LOKI_EXPORTER_CONFIG_FILE",
        default_value = "config.yml"
    )]
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 9524)),
            metrics_path: "/metrics".to_string(),
            config_file: PathBuf::from("config.yml"),
        }
    }
}

/// Parses a listen address. A missing host (`:9524`) binds all interfaces.
fn parse_listen_address(value: &str) -> Result<SocketAddr, String> {
    let value = value.trim();
    let candidate = if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.to_string()
    };

    candidate
        .parse()
        .map_err(|e| format!("invalid listen address '{value}': {e}"))
}

/// Validates the metrics path. It must be absolute and may not shadow the
/// root or health pages.
fn parse_metrics_path(value: &str) -> Result<String, String> {
    if !value.starts_with('/') {
        return Err(format!("metrics path '{value}' must start with '/'"));
    }
    if value == "/" || value == "/health" {
        return Err(format!("metrics path '{value}' is reserved"));
    }
    if value.contains(['{', '}', '*']) {
        return Err(format!("metrics path '{value}' must be a literal path"));
    }
    if value.contains(['"', '\'', '<', '>', '&']) || value.contains(char::is_whitespace) {
        return Err(format!("metrics path '{value}' contains characters that need escaping"));
    }
    Ok(value.to_string())
}
