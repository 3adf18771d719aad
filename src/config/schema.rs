use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable holding the weatherapi.com key.
pub const API_KEY_ENV: &str = "WEATHER_API_KEY";
/// Environment variable overriding the upstream base URL.
pub const BASE_URL_ENV: &str = "WEATHER_API_BASE_URL";

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub weather: WeatherConfig,
}

// ── Gateway ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// IP literal; IPv6 may be written bare (`::`) or bracketed (`[::]`).
    pub host: String,
    pub port: u16,
    /// Upper bound on handling one HTTP request, fan-out included.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3333,
            request_timeout_secs: 60,
        }
    }
}

// ── Weather lookups ───────────────────────────────────────────────

/// How `/weather` reports a fan-out in which some lookups failed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResponsePolicy {
    /// `200` with the successful reports; failures are omitted.
    #[default]
    BestEffort,
    /// `400` with the error messages if any lookup failed.
    AllOrNothing,
    /// `200` with both the reports and the per-city errors.
    Partial,
}

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Per upstream request.
    pub timeout_secs: u64,
    /// Lookups in flight per request; unset means one task per city at once.
    pub max_concurrency: Option<usize>,
    pub policy: ResponsePolicy,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::weather::weatherapi::WEATHERAPI_BASE.into(),
            timeout_secs: 30,
            max_concurrency: None,
            policy: ResponsePolicy::BestEffort,
        }
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_concurrency", &self.max_concurrency)
            .field("policy", &self.policy)
            .finish()
    }
}

// ── Loading ───────────────────────────────────────────────────────

impl Config {
    /// Load configuration: defaults, then the TOML file, then environment
    /// overrides.
    ///
    /// An explicit `path` must exist. Without one, the platform config file
    /// (see [`default_config_path`]) is read if present.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(PathBuf::from(shellexpand::tilde(p).as_ref())),
            None => default_config_path().filter(|p| p.is_file()),
        };

        let mut config = match file {
            Some(file) => Self::from_file(&file)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `WEATHER_API_KEY` / `WEATHER_API_BASE_URL` from the process
    /// environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_blank(API_KEY_ENV) {
            self.weather.api_key = Some(key);
        }
        if let Some(url) = non_blank(BASE_URL_ENV) {
            self.weather.base_url = url;
        }
        if self
            .weather
            .api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            self.weather.api_key = None;
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.weather.base_url.trim().is_empty(),
            "weather.base_url must not be empty"
        );
        anyhow::ensure!(
            self.weather.timeout_secs > 0,
            "weather.timeout_secs must be greater than 0"
        );
        anyhow::ensure!(
            self.gateway.request_timeout_secs > 0,
            "gateway.request_timeout_secs must be greater than 0"
        );
        if let Some(limit) = self.weather.max_concurrency {
            anyhow::ensure!(limit > 0, "weather.max_concurrency must be greater than 0");
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let host = self.gateway.host.trim();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("gateway.host {host:?} is not an IP address"))?;
        Ok(SocketAddr::new(ip, self.gateway.port))
    }
}

/// `<platform config dir>/cityweather/config.toml`, e.g.
/// `~/.config/cityweather/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "cityweather")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_reference_service() {
        let config = Config::default();
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:3333");
        assert_eq!(config.weather.policy, ResponsePolicy::BestEffort);
        assert_eq!(config.weather.max_concurrency, None);
        assert!(config.weather.api_key.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [weather]
            policy = "all-or-nothing"
            max_concurrency = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.weather.policy, ResponsePolicy::AllOrNothing);
        assert_eq!(config.weather.max_concurrency, Some(8));
        assert_eq!(config.gateway.port, 3333);
        assert_eq!(config.weather.timeout_secs, 30);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml("[weather]\napi_kee = \"typo\"\n").unwrap_err();
        assert!(err.to_string().contains("api_kee"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::from_toml("[weather]\napi_key = \"from-file\"\n").unwrap();
        config.apply_overrides_from(env(&[
            (API_KEY_ENV, "from-env"),
            (BASE_URL_ENV, "http://localhost:8080/v1"),
        ]));
        assert_eq!(config.weather.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.weather.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::from_toml("[weather]\napi_key = \"from-file\"\n").unwrap();
        config.apply_overrides_from(env(&[(API_KEY_ENV, "  "), (BASE_URL_ENV, "")]));
        assert_eq!(config.weather.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.weather.base_url, WeatherConfig::default().base_url);
    }

    #[test]
    fn blank_file_key_counts_as_missing() {
        let mut config = Config::from_toml("[weather]\napi_key = \"\"\n").unwrap();
        config.apply_overrides_from(env(&[]));
        assert!(config.weather.api_key.is_none());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.weather.max_concurrency = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.weather.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ipv6_hosts_bind_with_or_without_brackets() {
        let mut config = Config::default();
        config.gateway.host = "::".into();
        assert_eq!(config.bind_addr().unwrap().to_string(), "[::]:3333");

        config.gateway.host = "[::1]".into();
        config.gateway.port = 8080;
        assert_eq!(config.bind_addr().unwrap().to_string(), "[::1]:8080");
    }

    #[test]
    fn validate_rejects_non_ip_host() {
        let mut config = Config::default();
        config.gateway.host = "not a host".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gateway.host"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[gateway]\nhost = \"127.0.0.1\"\nport = 8081\n\n[weather]\npolicy = \"partial\"\n",
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8081");
        assert_eq!(config.weather.policy, ResponsePolicy::Partial);
    }

    #[test]
    fn load_fails_on_missing_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = Config::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = Config::default();
        config.weather.api_key = Some("super-secret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
