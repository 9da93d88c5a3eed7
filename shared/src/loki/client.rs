//! HTTP implementation of the [`LokiClient`] trait.

use super::models::{LegacyLabelResponse, LegacyQueryResponse, V1QueryData, V1Response};
use super::{LokiClient, LokiError, QueryStream, RangeQuery};
use crate::config::{ApiVersion, LokiConfig};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

/// Talks to Loki over HTTP using either the legacy or the v1 API.
///
/// Every request carries the configured basic auth credentials and is bounded
/// by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpLokiClient {
    http: reqwest::Client,
    base_url: Url,
    api: ApiVersion,
    credentials: Option<(String, String)>,
}

impl HttpLokiClient {
    /// Creates a client from the Loki connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The listen address is not an absolute URL that can carry a path
    /// - The underlying HTTP client cannot be built
    pub fn new(config: &LokiConfig) -> Result<Self, LokiError> {
        let base_url = Url::parse(&config.listen_address)
            .map_err(|_| LokiError::InvalidAddress(config.listen_address.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(LokiError::InvalidAddress(config.listen_address.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("loki_exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(LokiError::Client)?;

        let credentials = config
            .basic_auth
            .enabled
            .then(|| {
                (
                    config.basic_auth.username.clone(),
                    config.basic_auth.password.clone(),
                )
            });

        Ok(Self {
            http,
            base_url,
            api: config.api,
            credentials,
        })
    }

    /// Returns the API flavour this client speaks.
    #[must_use]
    pub fn api(&self) -> ApiVersion {
        self.api
    }

    /// Builds the URL of an endpoint below the base address.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, LokiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LokiError::InvalidAddress(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, LokiError> {
        tracing::debug!(url = %url, params = ?params, "Sending request to Loki");

        let mut request = self.http.get(url.clone());
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LokiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&url, e))?;

        serde_json::from_slice(&body).map_err(|source| LokiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn get_v1<T: DeserializeOwned + Default>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, LokiError> {
        let response: V1Response<T> = self.get_json(url, params).await?;
        if !response.is_success() {
            return Err(LokiError::Unsuccessful(response.status));
        }
        Ok(response.data)
    }

    fn range_params(&self, query: &RangeQuery) -> Result<Vec<(&'static str, String)>, LokiError> {
        let expression = match (self.api, query.regexp.as_deref()) {
            // The v1 endpoint has no regexp parameter, so the filter becomes
            // part of the expression.
            (ApiVersion::V1, Some(regexp)) => with_line_filter(&query.query, regexp),
            _ => query.query.clone(),
        };

        let mut params = vec![
            ("query", expression),
            ("limit", query.limit.to_string()),
            ("start", query.window.start_nanos()?.to_string()),
            ("end", query.window.end_nanos()?.to_string()),
        ];
        if let Some(direction) = query.direction {
            params.push(("direction", direction.to_string()));
        }
        if let (ApiVersion::Legacy, Some(regexp)) = (self.api, query.regexp.as_deref()) {
            params.push(("regexp", regexp.to_string()));
        }

        Ok(params)
    }
}

#[async_trait]
impl LokiClient for HttpLokiClient {
    async fn label_names(&self) -> Result<Vec<String>, LokiError> {
        match self.api {
            ApiVersion::Legacy => {
                let url = self.endpoint(&["api", "prom", "label"])?;
                let response: LegacyLabelResponse = self.get_json(url, &[]).await?;
                Ok(response.values)
            }
            ApiVersion::V1 => {
                let url = self.endpoint(&["loki", "api", "v1", "labels"])?;
                self.get_v1(url, &[]).await
            }
        }
    }

    async fn label_values(&self, label: &str) -> Result<Vec<String>, LokiError> {
        match self.api {
            ApiVersion::Legacy => {
                let url = self.endpoint(&["api", "prom", "label", label, "values"])?;
                let response: LegacyLabelResponse = self.get_json(url, &[]).await?;
                Ok(response.values)
            }
            ApiVersion::V1 => {
                let url = self.endpoint(&["loki", "api", "v1", "label", label, "values"])?;
                self.get_v1(url, &[]).await
            }
        }
    }

    async fn query_range(&self, query: &RangeQuery) -> Result<Vec<QueryStream>, LokiError> {
        let params = self.range_params(query)?;

        match self.api {
            ApiVersion::Legacy => {
                let url = self.endpoint(&["api", "prom", "query"])?;
                let response: LegacyQueryResponse = self.get_json(url, &params).await?;
                Ok(response.streams.into_iter().map(Into::into).collect())
            }
            ApiVersion::V1 => {
                let url = self.endpoint(&["loki", "api", "v1", "query_range"])?;
                let data: V1QueryData = self.get_v1(url, &params).await?;
                Ok(data.result.into_iter().map(Into::into).collect())
            }
        }
    }
}

fn transport_error(url: &Url, source: reqwest::Error) -> LokiError {
    if source.is_timeout() {
        LokiError::Timeout {
            url: url.to_string(),
        }
    } else {
        LokiError::Transport {
            url: url.to_string(),
            source,
        }
    }
}

/// Appends a `|~ "<regexp>"` line filter to a `LogQL` expression.
fn with_line_filter(query: &str, regexp: &str) -> String {
    let escaped = regexp.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{query} |~ \"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasicAuthConfig, Direction, QueryLimit};
    use crate::window::TimeWindow;
    use chrono::{TimeZone, Utc};

    fn config(address: &str, api: ApiVersion) -> LokiConfig {
        LokiConfig {
            listen_address: address.to_string(),
            api,
            ..LokiConfig::default()
        }
    }

    fn range_query(regexp: Option<&str>) -> RangeQuery {
        RangeQuery {
            query: "{job=\"api\"}".to_string(),
            limit: QueryLimit::Unbounded,
            window: TimeWindow {
                start: Utc.with_ymd_and_hms(2024, 1, 14, 12, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            },
            direction: Some(Direction::Backward),
            regexp: regexp.map(str::to_string),
        }
    }

    #[test]
    fn test_new_rejects_invalid_address() {
        let result = HttpLokiClient::new(&config("not a url", ApiVersion::Legacy));
        assert!(matches!(result, Err(LokiError::InvalidAddress(_))));

        let result = HttpLokiClient::new(&config("mailto:loki@example.com", ApiVersion::Legacy));
        assert!(matches!(result, Err(LokiError::InvalidAddress(_))));
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let client =
            HttpLokiClient::new(&config("http://gateway:8080/loki/", ApiVersion::Legacy)).unwrap();
        let url = client.endpoint(&["api", "prom", "label"]).unwrap();
        assert_eq!(url.as_str(), "http://gateway:8080/loki/api/prom/label");
    }

    #[test]
    fn test_endpoint_escapes_label_names() {
        let client = HttpLokiClient::new(&config("http://localhost:3100", ApiVersion::V1)).unwrap();
        let url = client
            .endpoint(&["loki", "api", "v1", "label", "a/b", "values"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3100/loki/api/v1/label/a%2Fb/values"
        );
    }

    #[test]
    fn test_credentials_only_when_enabled() {
        let mut loki = config("http://localhost:3100", ApiVersion::Legacy);
        loki.basic_auth = BasicAuthConfig {
            enabled: false,
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        assert!(HttpLokiClient::new(&loki).unwrap().credentials.is_none());

        loki.basic_auth.enabled = true;
        assert_eq!(
            HttpLokiClient::new(&loki).unwrap().credentials,
            Some(("admin".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_legacy_range_params() {
        let client =
            HttpLokiClient::new(&config("http://localhost:3100", ApiVersion::Legacy)).unwrap();
        let params = client.range_params(&range_query(Some("timeout"))).unwrap();

        assert_eq!(
            params,
            vec![
                ("query", "{job=\"api\"}".to_string()),
                ("limit", "-1".to_string()),
                ("start", "1705233600000000000".to_string()),
                ("end", "1705320000000000000".to_string()),
                ("direction", "backward".to_string()),
                ("regexp", "timeout".to_string()),
            ]
        );
    }

    #[test]
    fn test_v1_range_params_embed_regexp() {
        let client = HttpLokiClient::new(&config("http://localhost:3100", ApiVersion::V1)).unwrap();
        let params = client.range_params(&range_query(Some("a\"b"))).unwrap();

        assert_eq!(params[0].1, "{job=\"api\"} |~ \"a\\\"b\"");
        assert!(params.iter().all(|(name, _)| *name != "regexp"));
    }

    #[test]
    fn test_range_params_without_optional_fields() {
        let client = HttpLokiClient::new(&config("http://localhost:3100", ApiVersion::V1)).unwrap();
        let mut query = range_query(None);
        query.direction = None;

        let params = client.range_params(&query).unwrap();
        let names: Vec<_> = params.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["query", "limit", "start", "end"]);
    }

    #[test]
    fn test_with_line_filter() {
        assert_eq!(
            with_line_filter("{job=\"api\"}", r"err\d+"),
            r#"{job="api"} |~ "err\\d+""#
        );
    }
}
