//! HTTP gateway: `GET /` banner and `GET /weather?cities=..`.
//!
//! Built on axum. Each request is independent; the only state shared between
//! requests is the immutable [`AppState`].

pub mod weather;

use crate::config::{Config, ResponsePolicy};
use crate::resolver::FanOutResolver;
use crate::weather::weatherapi::WeatherApiClient;
use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// No route accepts a body.
pub const MAX_BODY_SIZE: usize = 4_096;

pub const BANNER: &str = "Simple weather API\n";

#[derive(Clone)]
pub struct AppState {
    pub resolver: FanOutResolver,
    pub policy: ResponsePolicy,
}

impl AppState {
    /// Build the weatherapi.com client and resolver from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = WeatherApiClient::new(
            config.weather.api_key.clone(),
            config.weather.base_url.clone(),
            Duration::from_secs(config.weather.timeout_secs),
        )?;

        if !client.has_credential() {
            tracing::warn!(
                "{} is not set; every weather lookup will fail",
                crate::config::API_KEY_ENV
            );
        }

        let resolver = FanOutResolver::new(Arc::new(client))
            .with_max_concurrency(config.weather.max_concurrency);

        Ok(Self {
            resolver,
            policy: config.weather.policy,
        })
    }
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/weather", get(weather::handle_weather))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}

async fn handle_root() -> &'static str {
    BANNER
}

/// Bind the configured address and serve until Ctrl+C / SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = build_router(
        state.clone(),
        Duration::from_secs(config.gateway.request_timeout_secs),
    );

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("error starting server: failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        policy = ?state.policy,
        max_concurrency = ?config.weather.max_concurrency,
        "weather gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server error")?;

    tracing::info!("server closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
