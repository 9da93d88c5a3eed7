//! Landing page pointing to the metrics endpoint.

use crate::instrument::BUILD_INFO;
use crate::state::AppState;
use axum::{extract::State, response::Html, routing::get, Router};

/// Creates the landing page route.
pub fn index_routes() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Loki Exporter</title></head>\n\
         <body>\n\
         <h1>Loki Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         <p><ul>\n\
         <li>version: {version}</li>\n\
         <li>branch: {branch}</li>\n\
         <li>revision: {revision}</li>\n\
         </ul></p>\n\
         </body>\n\
         </html>\n",
        path = escape_html(state.metrics_path()),
        version = escape_html(BUILD_INFO.version),
        branch = escape_html(BUILD_INFO.branch),
        revision = escape_html(BUILD_INFO.revision),
    ))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_state, test_state_at};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn page(state: AppState) -> String {
        let response = index_routes()
            .with_state(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_links_metrics_path() {
        let html = page(test_state(&[])).await;

        assert!(html.contains("<a href=\"/metrics\">Metrics</a>"));
        assert!(html.contains(&format!("<li>version: {}</li>", env!("CARGO_PKG_VERSION"))));
        assert!(html.contains("<li>branch: "));
        assert!(html.contains("<li>revision: "));
    }

    #[tokio::test]
    async fn test_index_escapes_metrics_path() {
        let html = page(test_state_at("/x\"><script>")).await;

        assert!(html.contains("<a href=\"/x&quot;&gt;&lt;script&gt;\">"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_index_does_not_scrape() {
        let state = test_state(&["job"]);

        page(state.clone()).await;

        assert!(state.exporter().metric_registry().is_empty().unwrap());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("/metrics"), "/metrics");
        assert_eq!(escape_html("a&b'c"), "a&amp;b&#39;c");
    }
}
