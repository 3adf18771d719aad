//! Weather provider abstraction.
//!
//! Defines the [`WeatherProvider`] trait that performs a single per-city
//! lookup, plus the [`WeatherReport`] it produces and the errors it can fail
//! with. One provider exists today:
//!
//! - [`weatherapi::WeatherApiClient`] — weatherapi.com REST API (requires `WEATHER_API_KEY`)
//!
//! The fan-out in [`crate::resolver`] only talks to the trait, so tests can
//! swap in canned providers.

pub mod weatherapi;

use async_trait::async_trait;
use serde::Serialize;

/// Current temperature for one city, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    /// Location name as normalized by the provider, not the requested string.
    pub city: String,
    #[serde(rename = "temperature")]
    pub temperature_celsius: f64,
}

/// Why a single lookup failed.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("WEATHER_API_KEY is not set")]
    MissingCredential,
    #[error("weather API request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("weather API returned {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode weather API response: {0}")]
    Decode(String),
    #[error("lookup task failed: {0}")]
    TaskFailed(String),
}

/// A failed lookup, tagged with the city that was requested.
#[derive(Debug, thiserror::Error)]
#[error("{city}: {source}")]
pub struct LookupError {
    pub city: String,
    #[source]
    pub source: WeatherError,
}

impl LookupError {
    pub fn new(city: impl Into<String>, source: WeatherError) -> Self {
        Self {
            city: city.into(),
            source,
        }
    }
}

/// Provider-agnostic current-weather lookup.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Fetch the current temperature for `city`.
    async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError>;
}
