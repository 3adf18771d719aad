//! weatherapi.com provider — HTTP client for the `current.json` endpoint.

use super::{WeatherError, WeatherProvider, WeatherReport};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Base URL for the weatherapi.com REST API.
pub const WEATHERAPI_BASE: &str = "https://api.weatherapi.com/v1";

#[derive(Deserialize)]
struct Location {
    name: String,
}

#[derive(Deserialize)]
struct Current {
    temp_c: f64,
}

/// The subset of the `current.json` payload this service relies on.
#[derive(Deserialize)]
struct CurrentResponse {
    location: Location,
    current: Current,
}

/// Shared HTTP client for weatherapi.com calls.
///
/// The credential is resolved once at startup and injected here; a missing
/// key does not prevent construction, every lookup fails instead.
pub struct WeatherApiClient {
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl WeatherApiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cityweather/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/current.json", self.base_url)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    fn name(&self) -> &str {
        "weatherapi"
    }

    async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(WeatherError::MissingCredential)?;

        // The URL carries the key, so transport errors are stored without it.
        // `.query` percent-encodes, so cities like "New York" or "São Paulo"
        // reach the provider intact.
        let resp = self
            .http
            .get(self.endpoint())
            .query(&[("key", api_key), ("q", city), ("aqi", "yes")])
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.without_url()))?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.without_url()))?;

        if !status.is_success() {
            return Err(WeatherError::UpstreamStatus {
                status,
                body: body_text,
            });
        }

        let parsed: CurrentResponse = serde_json::from_str(&body_text)
            .map_err(|e| WeatherError::Decode(format!("{e}; body: {body_text}")))?;

        Ok(WeatherReport {
            city: parsed.location.name,
            temperature_celsius: parsed.current.temp_c,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(api_key: Option<&str>, base_url: &str) -> WeatherApiClient {
        WeatherApiClient::new(
            api_key.map(str::to_string),
            base_url,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(!client(Some("   "), WEATHERAPI_BASE).has_credential());
        assert!(!client(None, WEATHERAPI_BASE).has_credential());
        assert!(client(Some("k"), WEATHERAPI_BASE).has_credential());
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let c = client(Some("k"), "http://localhost:9999/v1/");
        assert_eq!(c.endpoint(), "http://localhost:9999/v1/current.json");
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(None, &server.uri()).current("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::MissingCredential));
    }

    #[tokio::test]
    async fn decodes_provider_location_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/current.json"))
            .and(query_param("key", "secret"))
            .and(query_param("q", "london"))
            .and(query_param("aqi", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "location": { "name": "London", "country": "United Kingdom" },
                "current": { "temp_c": 12.0, "temp_f": 53.6 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = client(Some("secret"), &server.uri())
            .current("london")
            .await
            .unwrap();
        assert_eq!(report.city, "London");
        assert_eq!(report.temperature_celsius, 12.0);
    }

    #[tokio::test]
    async fn city_name_is_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/current.json"))
            .and(query_param("q", "New York&x=1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "location": { "name": "New York" },
                "current": { "temp_c": 3.5 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = client(Some("k"), &server.uri())
            .current("New York&x=1")
            .await
            .unwrap();
        assert_eq!(report.city, "New York");
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error":{"code":1003,"message":"Parameter q is missing."}}"#,
            ))
            .mount(&server)
            .await;

        let err = client(Some("k"), &server.uri()).current("").await.unwrap_err();
        match err {
            WeatherError::UpstreamStatus { status, body } => {
                assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
                assert!(body.contains("Parameter q is missing"));
            }
            other => panic!("expected UpstreamStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "location": {} })))
            .mount(&server)
            .await;

        let err = client(Some("k"), &server.uri()).current("Oslo").await.unwrap_err();
        assert!(matches!(err, WeatherError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_network_error() {
        // Nothing listens on the discard port.
        let err = client(Some("k"), "http://127.0.0.1:9")
            .current("Oslo")
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Network(_)));
    }

    #[tokio::test]
    async fn network_error_does_not_reveal_api_key() {
        let err = client(Some("TOPSECRETKEY"), "http://127.0.0.1:9")
            .current("Oslo")
            .await
            .unwrap_err();
        let rendered = format!("{err} / {err:?}");
        assert!(!rendered.contains("TOPSECRETKEY"), "{rendered}");
    }
}
