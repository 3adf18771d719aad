//! Fan-out/fan-in over per-city weather lookups.
//!
//! [`FanOutResolver::resolve`] spawns one task per requested city, waits for
//! every one of them, and returns a [`Resolution`] holding exactly one outcome
//! per input entry. Outcomes land in index-addressed slots, so the resolution
//! is in request order no matter which lookup finishes first.

use crate::weather::{LookupError, WeatherError, WeatherProvider, WeatherReport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Requested city names, in request order.
///
/// Built by splitting the raw parameter on `,`. Entries are not trimmed or
/// deduplicated, and an empty parameter yields a single empty entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityQuery(Vec<String>);

impl CityQuery {
    pub fn parse(raw: &str) -> Self {
        Self(raw.split(',').map(str::to_string).collect())
    }

    pub fn cities(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub type Outcome = Result<WeatherReport, LookupError>;

/// Every lookup outcome of one fan-out, one per requested city.
#[derive(Debug)]
pub struct Resolution {
    outcomes: Vec<Outcome>,
}

impl Resolution {
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Successful reports only; failures are dropped.
    pub fn into_reports(self) -> Vec<WeatherReport> {
        self.outcomes.into_iter().filter_map(Result::ok).collect()
    }

    /// All reports if every lookup succeeded, otherwise every error and no reports.
    pub fn into_all_or_nothing(self) -> Result<Vec<WeatherReport>, Vec<LookupError>> {
        let (reports, errors) = self.into_parts();
        if errors.is_empty() {
            Ok(reports)
        } else {
            Err(errors)
        }
    }

    pub fn into_parts(self) -> (Vec<WeatherReport>, Vec<LookupError>) {
        let mut reports = Vec::new();
        let mut errors = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(err) => errors.push(err),
            }
        }
        (reports, errors)
    }
}

/// Issues one concurrent lookup per city and joins on all of them.
#[derive(Clone)]
pub struct FanOutResolver {
    provider: Arc<dyn WeatherProvider>,
    max_concurrency: Option<usize>,
}

impl FanOutResolver {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            max_concurrency: None,
        }
    }

    /// Cap the number of lookups in flight for a single resolution.
    /// `None` spawns every lookup at once.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub async fn resolve(&self, query: &CityQuery) -> Resolution {
        let cities = query.cities();
        // Per resolution, so concurrent requests never wait on each other.
        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));

        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(cities.len());

        for (index, city) in cities.iter().cloned().enumerate() {
            let provider = Arc::clone(&self.provider);
            let limiter = limiter.clone();
            let handle = tasks.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = provider
                    .current(&city)
                    .await
                    .map_err(|e| LookupError::new(city, e));
                (index, outcome)
            });
            task_slots.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<Outcome>> = std::iter::repeat_with(|| None)
            .take(cities.len())
            .collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => {
                    if let Some(&index) = task_slots.get(&e.id()) {
                        slots[index] = Some(Err(LookupError::new(
                            cities[index].clone(),
                            WeatherError::TaskFailed(e.to_string()),
                        )));
                    }
                }
            }
        }

        let outcomes: Vec<Outcome> = slots
            .into_iter()
            .zip(cities)
            .map(|(slot, city)| {
                slot.unwrap_or_else(|| {
                    Err(LookupError::new(
                        city.clone(),
                        WeatherError::TaskFailed("no result recorded".into()),
                    ))
                })
            })
            .collect();

        for err in outcomes.iter().filter_map(|o| o.as_ref().err()) {
            tracing::debug!(
                provider = self.provider.name(),
                city = %err.city,
                error = %err.source,
                "weather lookup failed"
            );
        }

        let resolution = Resolution { outcomes };
        tracing::debug!(
            requested = cities.len(),
            succeeded = resolution.succeeded(),
            failed = resolution.failed(),
            "fan-out complete"
        );
        resolution
    }
}
