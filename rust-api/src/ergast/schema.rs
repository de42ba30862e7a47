//! Wire format of the Ergast-compatible results API
//!
//! Every payload is wrapped in `MRData`. Numeric fields are sent as strings.

use serde::Deserialize;
use std::str::FromStr;

use super::ApiError;
use crate::data::results::ResultRecord;
use crate::models::{Location, RaceEntry, RaceMeta, StandingEntry};

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "MRData")]
    pub mr_data: MrData,
}

#[derive(Debug, Deserialize)]
pub struct MrData {
    #[serde(default)]
    pub total: String,
    #[serde(rename = "RaceTable")]
    pub race_table: Option<RaceTable>,
    #[serde(rename = "StandingsTable")]
    pub standings_table: Option<StandingsTable>,
}

impl MrData {
    /// Total number of rows behind this page
    pub fn total_rows(&self) -> Result<usize, ApiError> {
        if self.total.is_empty() {
            return Ok(0);
        }
        parse_field("total", &self.total)
    }

    pub fn races(&self) -> &[Race] {
        self.race_table
            .as_ref()
            .map(|t| t.races.as_slice())
            .unwrap_or(&[])
    }

    pub fn standings_lists(&self) -> &[StandingsList] {
        self.standings_table
            .as_ref()
            .map(|t| t.standings_lists.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Deserialize)]
pub struct RaceTable {
    #[serde(rename = "Races", default)]
    pub races: Vec<Race>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Race {
    pub season: String,
    pub round: String,
    #[serde(rename = "raceName")]
    pub race_name: String,
    pub date: Option<String>,
    pub time: Option<String>,
    #[serde(rename = "Circuit")]
    pub circuit: Circuit,
    #[serde(rename = "Results", default)]
    pub results: Vec<RaceResult>,
    #[serde(rename = "QualifyingResults", default)]
    pub qualifying: Vec<QualifyingResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Circuit {
    #[serde(rename = "circuitName")]
    pub circuit_name: String,
    #[serde(rename = "Location", default)]
    pub location: Location,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Driver {
    #[serde(rename = "givenName", default)]
    pub given_name: String,
    #[serde(rename = "familyName", default)]
    pub family_name: String,
}

impl Driver {
    /// Display name, "<given> <family>"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Constructor {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceResult {
    pub position: String,
    pub points: String,
    pub grid: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "Driver")]
    pub driver: Driver,
    #[serde(rename = "Constructor")]
    pub constructor: Constructor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualifyingResult {
    pub position: String,
    #[serde(rename = "Driver")]
    pub driver: Driver,
    #[serde(rename = "Constructor")]
    pub constructor: Constructor,
}

#[derive(Debug, Deserialize)]
pub struct StandingsTable {
    #[serde(rename = "StandingsLists", default)]
    pub standings_lists: Vec<StandingsList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandingsList {
    #[serde(rename = "DriverStandings", default)]
    pub driver_standings: Vec<DriverStanding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverStanding {
    #[serde(default)]
    pub position: Option<String>,
    #[serde(rename = "Driver")]
    pub driver: Driver,
    #[serde(rename = "Constructors", default)]
    pub constructors: Vec<Constructor>,
}

fn parse_field<T: FromStr>(field: &str, value: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::Malformed(format!("invalid {}: {:?}", field, value)))
}

/// Flatten a page of races into result records
pub fn to_result_records(races: &[Race]) -> Result<Vec<ResultRecord>, ApiError> {
    let mut records = Vec::new();
    for race in races {
        let season: i32 = parse_field("season", &race.season)?;
        let round: u32 = parse_field("round", &race.round)?;
        for result in &race.results {
            records.push(ResultRecord {
                season,
                round,
                race: race.race_name.clone(),
                driver: result.driver.display_name(),
                constructor: result.constructor.name.clone(),
                position: parse_field("position", &result.position)?,
                grid: parse_field("grid", &result.grid)?,
                points: parse_field("points", &result.points)?,
                status: result.status.clone(),
            });
        }
    }
    Ok(records)
}

pub fn to_race_meta(race: &Race) -> Result<RaceMeta, ApiError> {
    Ok(RaceMeta {
        season: parse_field("season", &race.season)?,
        round: parse_field("round", &race.round)?,
        race_name: race.race_name.clone(),
        date: race.date.clone(),
        time: race.time.clone(),
        circuit: race.circuit.circuit_name.clone(),
        location: race.circuit.location.clone(),
    })
}

/// Qualifying order as an entry list; grid is the qualifying position
pub fn to_qualifying_entries(race: &Race) -> Result<Vec<RaceEntry>, ApiError> {
    race.qualifying
        .iter()
        .map(|q| {
            Ok(RaceEntry {
                driver: q.driver.display_name(),
                constructor: q.constructor.name.clone(),
                grid: parse_field("position", &q.position)?,
            })
        })
        .collect()
}

pub fn to_standing_entries(list: &StandingsList) -> Result<Vec<StandingEntry>, ApiError> {
    list.driver_standings
        .iter()
        .map(|s| {
            let standing_position = match s.position.as_deref() {
                Some(position) => parse_field("position", position)?,
                None => 0,
            };
            Ok(StandingEntry {
                driver: s.driver.display_name(),
                constructor: s
                    .constructors
                    .first()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                standing_position,
            })
        })
        .collect()
}
