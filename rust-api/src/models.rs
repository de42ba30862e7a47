use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One driver entered in an upcoming race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEntry {
    pub driver: String,
    pub constructor: String,
    pub grid: u32,
}

/// Circuit location as reported by the results API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub long: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub country: String,
}

/// Next race metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceMeta {
    pub season: i32,
    pub round: u32,
    #[serde(rename = "raceName")]
    pub race_name: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub circuit: String,
    pub location: Location,
}

/// Driver standing row, used as the roster before qualifying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub driver: String,
    pub constructor: String,
    pub standing_position: u32,
}

/// Win probability for one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverPrediction {
    pub driver: String,
    pub constructor: String,
    pub grid: u32,
    pub win_probability: f64,
}

/// Caller-supplied grid row. Both fields stay loosely typed, and a row that
/// is not an object reads as an empty row, so bad values are reported per
/// index instead of rejecting the whole body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct GridRow {
    pub driver: serde_json::Value,
    pub grid: serde_json::Value,
}

impl From<serde_json::Value> for GridRow {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(mut fields) => Self {
                driver: fields.remove("driver").unwrap_or_default(),
                grid: fields.remove("grid").unwrap_or_default(),
            },
            _ => Self::default(),
        }
    }
}

/// Body of `POST /api/predict-next-race-with-grid`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridRequest {
    #[serde(default)]
    pub grid: Vec<GridRow>,
}

/// Body of `POST /api/predict`: feature name -> value
pub type FeatureRequest = HashMap<String, f64>;

/// Reason a grid row was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryIssue {
    UnknownDriver,
    InvalidGrid,
}

/// Per-index validation error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryError {
    pub index: usize,
    pub driver: String,
    pub issue: EntryIssue,
}

/// Next race response
#[derive(Debug, Serialize, Deserialize)]
pub struct GridResponse {
    pub grid: Vec<RaceEntry>,
}

/// Roster response (standings fallback)
#[derive(Debug, Serialize, Deserialize)]
pub struct RosterResponse {
    pub race: RaceMeta,
    pub drivers: Vec<StandingEntry>,
}

/// Race prediction response
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub race: RaceMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub predictions: Vec<DriverPrediction>,
}

/// Single feature-vector prediction response
#[derive(Debug, Serialize, Deserialize)]
pub struct FeaturePredictionResponse {
    pub win_probability: f64,
}

/// Upstream had nothing to report (no next race, no roster)
#[derive(Debug, Serialize, Deserialize)]
pub struct NoDataResponse {
    pub error: String,
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub features: Vec<String>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<EntryError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
