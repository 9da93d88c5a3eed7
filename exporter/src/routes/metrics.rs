//! Prometheus scrape endpoint.
//!
//! Every request runs a full scrape cycle against Loki and answers with the
//! text exposition of the result.

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

/// Creates the metrics route on the given path.
pub fn metrics_routes(path: &str) -> Router<AppState> {
    Router::new().route(path, get(metrics_handler))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let exporter = state.exporter();
    let in_flight = exporter.handler_metrics().start();

    let response = match exporter.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    };

    drop(in_flight);
    exporter
        .handler_metrics()
        .observe(response.status().as_u16());
    response
}
