//! Turning a [`Resolution`] into the body `/weather` returns.
//!
//! The policy is fixed per process (see [`ResponsePolicy`]); a single request
//! never mixes two of them.

use crate::config::ResponsePolicy;
use crate::resolver::Resolution;
use crate::weather::WeatherReport;
use serde::Serialize;

/// One failed city in a [`ResponsePolicy::Partial`] body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityFailure {
    pub city: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialBody {
    pub results: Vec<WeatherReport>,
    pub errors: Vec<CityFailure>,
}

/// The policy-shaped result of one fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PolicyOutcome {
    /// `[ { "city": .., "temperature": .. }, .. ]`
    Reports(Vec<WeatherReport>),
    /// `[ "<error message>", .. ]`; only produced by all-or-nothing.
    Rejected(Vec<String>),
    Partial(PartialBody),
}

impl PolicyOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub fn apply(policy: ResponsePolicy, resolution: Resolution) -> PolicyOutcome {
    match policy {
        ResponsePolicy::BestEffort => PolicyOutcome::Reports(resolution.into_reports()),
        ResponsePolicy::AllOrNothing => match resolution.into_all_or_nothing() {
            Ok(reports) => PolicyOutcome::Reports(reports),
            Err(errors) => {
                PolicyOutcome::Rejected(errors.iter().map(ToString::to_string).collect())
            }
        },
        ResponsePolicy::Partial => {
            let (results, errors) = resolution.into_parts();
            PolicyOutcome::Partial(PartialBody {
                results,
                errors: errors
                    .into_iter()
                    .map(|e| CityFailure {
                        error: e.source.to_string(),
                        city: e.city,
                    })
                    .collect(),
            })
        }
    }
}

/// Serialize with a four-space indent and a trailing newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}
