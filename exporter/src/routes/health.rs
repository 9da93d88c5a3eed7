//! Liveness and last-scrape status.
//!
//! Answers from the state of the last scrape cycle without contacting Loki
//! and never starts a cycle of its own.

use crate::instrument::BUILD_INFO;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Outcome of the last scrape cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LastScrape {
    /// No cycle has run yet.
    Pending,
    /// The last cycle completed.
    Completed,
    /// A cycle is running or the last one was aborted.
    Incomplete,
}

/// Status report of the exporter.
#[derive(Debug, Serialize)]
pub struct ExporterStatus {
    /// Outcome of the last scrape cycle.
    pub last_scrape: LastScrape,
    /// Number of scrape cycles started since startup.
    pub total_scrapes: u64,
    /// Exporter version.
    pub version: &'static str,
}

/// Creates the status route.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(exporter_status))
}

async fn exporter_status(State(state): State<AppState>) -> Json<ExporterStatus> {
    let exporter = state.exporter();
    let total_scrapes = exporter.total_scrapes();
    let last_scrape = match (total_scrapes, exporter.is_up()) {
        (0, _) => LastScrape::Pending,
        (_, true) => LastScrape::Completed,
        (_, false) => LastScrape::Incomplete,
    };

    Json(ExporterStatus {
        last_scrape,
        total_scrapes,
        version: BUILD_INFO.version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn status(state: AppState) -> Value {
        let response = health_routes()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_status_before_first_scrape() {
        let state = test_state(&["job"]);

        let report = status(state.clone()).await;

        assert_eq!(report["last_scrape"], "pending");
        assert_eq!(report["total_scrapes"], 0);
        assert_eq!(report["version"], env!("CARGO_PKG_VERSION"));
        // Reporting does not scrape.
        assert_eq!(state.exporter().total_scrapes(), 0);
    }

    #[tokio::test]
    async fn test_status_after_scrapes() {
        let state = test_state(&["job"]);
        state.exporter().scrape().await;
        state.exporter().scrape().await;

        let report = status(state).await;

        assert_eq!(report["last_scrape"], "completed");
        assert_eq!(report["total_scrapes"], 2);
    }
}
