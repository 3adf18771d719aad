//! `GET /weather?cities=a,b,c` — fan out one lookup per city and answer with
//! the policy-shaped JSON body.

use super::AppState;
use crate::policy::{self, PolicyOutcome};
use crate::resolver::CityQuery;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// First `cities` value in the query string. Repeats are ignored rather
/// than rejected, and an absent parameter reads as empty.
fn first_cities_param(params: &[(String, String)]) -> &str {
    params
        .iter()
        .find(|(name, _)| name == "cities")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default()
}

pub async fn handle_weather(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let query = CityQuery::parse(first_cities_param(&params));
    let resolution = state.resolver.resolve(&query).await;

    tracing::info!(
        requested = query.len(),
        succeeded = resolution.succeeded(),
        failed = resolution.failed(),
        "weather request"
    );

    render(policy::apply(state.policy, resolution))
}

fn render(outcome: PolicyOutcome) -> Response {
    let body = match policy::to_pretty_json(&outcome) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to encode weather response: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode response: {e}"),
            )
                .into_response();
        }
    };

    if outcome.is_rejected() {
        return (
            StatusCode::BAD_REQUEST,
            [
                (header::CONTENT_TYPE, "application/json; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            body,
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
