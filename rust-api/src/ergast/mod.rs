//! Results API access
//!
//! Season results, next race metadata, next race qualifying and current
//! driver standings from an Ergast-compatible API.
//!
//! # Example
//!
//! ```no_run
//! use f1_predictor::ergast::{ClientConfig, ErgastClient, RaceDataSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ErgastClient::new(ClientConfig::default())?;
//!
//!     let results = client.season_results(2023).await?;
//!     println!("Fetched {} results", results.len());
//!
//!     Ok(())
//! }
//! ```

mod client;
pub mod schema;

pub use client::{ClientConfig, ErgastClient, DEFAULT_BASE_URL, PAGE_LIMIT};

use async_trait::async_trait;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::warn;

use crate::data::results::ResultRecord;
use crate::models::{RaceEntry, RaceMeta, StandingEntry};

/// Results API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Upstream race data
#[async_trait]
pub trait RaceDataSource: Send + Sync {
    /// Every result of every completed round in `season`
    async fn season_results(&self, season: i32) -> Result<Vec<ResultRecord>, ApiError>;

    /// Next scheduled race, if any
    async fn next_race(&self) -> Result<Option<RaceMeta>, ApiError>;

    /// Qualifying order of the next race; empty before qualifying has run
    async fn next_qualifying(&self) -> Result<Vec<RaceEntry>, ApiError>;

    /// Current driver standings
    async fn driver_standings(&self) -> Result<Vec<StandingEntry>, ApiError>;
}

/// Results of a multi-season fetch
#[derive(Debug, Default)]
pub struct SeasonFetch {
    pub records: Vec<ResultRecord>,
    pub failed: Vec<(i32, ApiError)>,
}

/// Fetch a range of seasons. A failing season is logged and skipped.
pub async fn fetch_seasons(
    source: &dyn RaceDataSource,
    seasons: RangeInclusive<i32>,
) -> SeasonFetch {
    let mut fetch = SeasonFetch::default();

    for season in seasons {
        match source.season_results(season).await {
            Ok(records) => fetch.records.extend(records),
            Err(e) => {
                warn!("Skipping season {}: {}", season, e);
                fetch.failed.push((season, e));
            }
        }
    }

    fetch
}

/// Fixed data held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub results: HashMap<i32, Vec<ResultRecord>>,
    pub next_race: Option<RaceMeta>,
    pub qualifying: Vec<RaceEntry>,
    pub standings: Vec<StandingEntry>,
}

#[async_trait]
impl RaceDataSource for InMemorySource {
    async fn season_results(&self, season: i32) -> Result<Vec<ResultRecord>, ApiError> {
        Ok(self.results.get(&season).cloned().unwrap_or_default())
    }

    async fn next_race(&self) -> Result<Option<RaceMeta>, ApiError> {
        Ok(self.next_race.clone())
    }

    async fn next_qualifying(&self) -> Result<Vec<RaceEntry>, ApiError> {
        Ok(self.qualifying.clone())
    }

    async fn driver_standings(&self) -> Result<Vec<StandingEntry>, ApiError> {
        Ok(self.standings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakySource {
        data: InMemorySource,
        broken_season: i32,
    }

    #[async_trait]
    impl RaceDataSource for FlakySource {
        async fn season_results(&self, season: i32) -> Result<Vec<ResultRecord>, ApiError> {
            if season == self.broken_season {
                return Err(ApiError::Status {
                    url: format!("http://test/{}/results.json", season),
                    status: 503,
                });
            }
            self.data.season_results(season).await
        }

        async fn next_race(&self) -> Result<Option<RaceMeta>, ApiError> {
            self.data.next_race().await
        }

        async fn next_qualifying(&self) -> Result<Vec<RaceEntry>, ApiError> {
            self.data.next_qualifying().await
        }

        async fn driver_standings(&self) -> Result<Vec<StandingEntry>, ApiError> {
            self.data.driver_standings().await
        }
    }

    fn record(season: i32) -> ResultRecord {
        ResultRecord {
            season,
            round: 1,
            race: "Bahrain Grand Prix".to_string(),
            driver: "Max Verstappen".to_string(),
            constructor: "Red Bull".to_string(),
            position: 1,
            grid: 1,
            points: 25.0,
            status: "Finished".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_seasons_skips_failures() {
        let mut data = InMemorySource::default();
        for season in 2021..=2023 {
            data.results.insert(season, vec![record(season)]);
        }
        let source = FlakySource {
            data,
            broken_season: 2022,
        };

        let fetch = fetch_seasons(&source, 2021..=2023).await;

        let seasons: Vec<i32> = fetch.records.iter().map(|r| r.season).collect();
        assert_eq!(seasons, vec![2021, 2023]);
        assert_eq!(fetch.failed.len(), 1);
        assert_eq!(fetch.failed[0].0, 2022);
    }

    #[tokio::test]
    async fn test_in_memory_source_unknown_season() {
        let source = InMemorySource::default();
        assert!(source.season_results(1950).await.unwrap().is_empty());
        assert!(source.next_race().await.unwrap().is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = ApiError::Status {
            url: "http://test/current/next.json".to_string(),
            status: 500,
        };
        assert_eq!(err.to_string(), "http://test/current/next.json returned HTTP 500");
    }
}
