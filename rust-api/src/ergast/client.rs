//! HTTP client for the Ergast-compatible results API

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::schema::{self, Envelope, MrData};
use super::{ApiError, RaceDataSource};
use crate::data::results::ResultRecord;
use crate::models::{RaceEntry, RaceMeta, StandingEntry};

/// Public Jolpica mirror of the Ergast API
pub const DEFAULT_BASE_URL: &str = "https://api.jolpi.ca/ergast/f1";

/// Rows requested per page
pub const PAGE_LIMIT: usize = 100;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: format!("f1-predictor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Results API client. One request per call, no retries, no caching.
pub struct ErgastClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ErgastClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET one page and unwrap the `MRData` envelope
    async fn fetch_page(&self, path: &str, limit: usize, offset: usize) -> Result<MrData, ApiError> {
        let url = self.build_url(path);
        debug!("GET {} (limit={}, offset={})", url, limit, offset);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body)
            .map_err(|e| ApiError::Malformed(format!("{}: {}", url, e)))?;
        Ok(envelope.mr_data)
    }
}

#[async_trait]
impl RaceDataSource for ErgastClient {
    async fn season_results(&self, season: i32) -> Result<Vec<ResultRecord>, ApiError> {
        let path = format!("{}/results.json", season);
        let mut records = Vec::new();
        let mut offset = 0;

        // Pages split races at arbitrary result rows, so records are
        // accumulated rather than merged per race.
        loop {
            let page = self.fetch_page(&path, PAGE_LIMIT, offset).await?;
            let total = page.total_rows()?;
            records.extend(schema::to_result_records(page.races())?);

            offset += PAGE_LIMIT;
            if offset >= total {
                break;
            }
        }

        info!("Fetched {} results for season {}", records.len(), season);
        Ok(records)
    }

    async fn next_race(&self) -> Result<Option<RaceMeta>, ApiError> {
        let page = self.fetch_page("current/next.json", PAGE_LIMIT, 0).await?;
        page.races().first().map(schema::to_race_meta).transpose()
    }

    async fn next_qualifying(&self) -> Result<Vec<RaceEntry>, ApiError> {
        let page = self
            .fetch_page("current/next/qualifying.json", PAGE_LIMIT, 0)
            .await?;
        match page.races().first() {
            Some(race) => schema::to_qualifying_entries(race),
            None => Ok(Vec::new()),
        }
    }

    async fn driver_standings(&self) -> Result<Vec<StandingEntry>, ApiError> {
        let page = self
            .fetch_page("current/driverStandings.json", PAGE_LIMIT, 0)
            .await?;
        match page.standings_lists().first() {
            Some(list) => schema::to_standing_entries(list),
            None => Ok(Vec::new()),
        }
    }
}
