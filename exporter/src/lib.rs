//! Loki Exporter Server
//!
//! This crate provides the HTTP server of the Loki exporter. Every scrape of
//! the metrics endpoint queries Loki for label and query statistics and
//! answers with the result in the Prometheus text format.
//!
//! # Architecture
//!
//! The server is built on Axum and Tokio, providing:
//! - The metrics endpoint driving the scrape cycles
//! - A landing page and a health endpoint
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use exporter::{run_server, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server(Config::parse()).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod collector;
mod config;
mod instrument;
mod routes;
mod scrape;
mod state;

#[cfg(test)]
mod testing;

pub use collector::{FamilySink, LokiCollector};
pub use config::Config;
pub use instrument::{BuildInfo, HandlerMetrics, InFlight, BUILD_INFO};
pub use scrape::{Exporter, ExporterError, NAMESPACE};
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use shared::config::ExporterConfig;
use shared::loki::HttpLokiClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runs the exporter server.
///
/// Loads the exporter configuration file, builds the Loki client and starts
/// listening for scrapes. It handles graceful shutdown on SIGTERM/SIGINT
/// signals.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file cannot be read, parsed or validated
/// - The Loki client cannot be created
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server(config: Config) -> Result<()> {
    let exporter_config = ExporterConfig::load(&config.config_file).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config.config_file.display()
        )
    })?;

    tracing::info!(
        version = BUILD_INFO.version,
        revision = BUILD_INFO.revision,
        branch = BUILD_INFO.branch,
        loki = %exporter_config.loki.listen_address,
        api = ?exporter_config.loki.api,
        queries = exporter_config.queries.len(),
        "Loki exporter starting"
    );

    let client = HttpLokiClient::new(&exporter_config.loki)?;
    let exporter = Exporter::new(exporter_config, Arc::new(client))?;

    #[cfg(target_os = "linux")]
    exporter
        .prometheus_registry()
        .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

    let state = AppState::new(Arc::new(exporter), config.metrics_path.as_str());
    let app = create_router(state);
    let listener = TcpListener::bind(config.listen_address).await?;

    tracing::info!(
        addr = %config.listen_address,
        metrics_path = %config.metrics_path,
        "Listening for connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    let metrics_path = state.metrics_path().to_string();

    Router::new()
        .merge(routes::index_routes())
        .merge(routes::metrics_routes(&metrics_path))
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_router_serves_all_pages() {
        let app = create_router(test_state(&["job"]));

        assert_eq!(status(app.clone(), "/").await, StatusCode::OK);
        assert_eq!(status(app.clone(), "/metrics").await, StatusCode::OK);
        assert_eq!(status(app.clone(), "/health").await, StatusCode::OK);
        assert_eq!(status(app, "/unknown").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_json() {
        let app = create_router(test_state(&[]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok());

        assert!(content_type.is_some_and(|ct| ct.contains("application/json")));
    }

    #[tokio::test]
    async fn test_run_server_fails_on_missing_config_file() {
        let config = Config {
            config_file: "/nonexistent/loki_exporter.yml".into(),
            ..Config::default()
        };

        let err = run_server(config).await.unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
