//! Feature Engineering
//!
//! Turns historical results into the per (season, round, driver) feature rows
//! the classifier is trained on.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::data::form::{FormTracker, PriorForm};
use crate::data::results::ResultRecord;

/// Number of model input features
pub const FEATURE_COUNT: usize = 8;

/// Model input order. Persisted next to the trained model and checked again
/// when the model is loaded for serving.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "grid",
    "drv_pts_to_date",
    "drv_roll_pts_5",
    "drv_roll_pos_5",
    "drv_roll_dnf_5",
    "con_pts_to_date",
    "con_roll_pts_5",
    "round_norm",
];

/// Label column in `features.csv`
pub const LABEL_COLUMN: &str = "win";
/// Season column in `features.csv`
pub const SEASON_COLUMN: &str = "season";

/// Get the feature names as owned strings
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Feature vector for one driver entering one race
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub grid: f64,
    pub drv_pts_to_date: f64,
    pub drv_roll_pts_5: f64,
    pub drv_roll_pos_5: f64,
    pub drv_roll_dnf_5: f64,
    pub con_pts_to_date: f64,
    pub con_roll_pts_5: f64,
    pub round_norm: f64,
}

impl FeatureVector {
    /// Assemble a vector from the driver's and the constructor's prior form
    pub fn new(grid: u32, driver: &PriorForm, constructor: &PriorForm, round_norm: f64) -> Self {
        Self {
            grid: grid as f64,
            drv_pts_to_date: driver.points_to_date,
            drv_roll_pts_5: driver.rolling_points,
            drv_roll_pos_5: driver.rolling_position,
            drv_roll_dnf_5: driver.rolling_dnf,
            con_pts_to_date: constructor.points_to_date,
            con_roll_pts_5: constructor.rolling_points,
            round_norm,
        }
    }

    /// Flatten in `FEATURE_NAMES` order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.grid,
            self.drv_pts_to_date,
            self.drv_roll_pts_5,
            self.drv_roll_pos_5,
            self.drv_roll_dnf_5,
            self.con_pts_to_date,
            self.con_roll_pts_5,
            self.round_norm,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [grid, drv_pts_to_date, drv_roll_pts_5, drv_roll_pos_5, drv_roll_dnf_5, con_pts_to_date, con_roll_pts_5, round_norm] =
            values;
        Self {
            grid,
            drv_pts_to_date,
            drv_roll_pts_5,
            drv_roll_pos_5,
            drv_roll_dnf_5,
            con_pts_to_date,
            con_roll_pts_5,
            round_norm,
        }
    }
}

/// One training row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub season: i32,
    pub round: u32,
    pub driver: String,
    pub constructor: String,
    pub win: bool,
    pub features: FeatureVector,
}

/// Offline feature builder over the full results history
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Build one feature row per result.
    ///
    /// Rows come back ordered by (season, round); results sharing a round keep
    /// their input order. Driver and constructor form are tracked per season.
    pub fn build(results: &[ResultRecord]) -> Vec<FeatureRow> {
        let mut order: Vec<usize> = (0..results.len()).collect();
        order.sort_by_key(|&i| (results[i].season, results[i].round));

        let mut season_max_round: HashMap<i32, u32> = HashMap::new();
        for result in results {
            let max = season_max_round.entry(result.season).or_insert(0);
            *max = (*max).max(result.round);
        }

        let mut drivers: HashMap<(i32, &str), FormTracker> = HashMap::new();
        let mut teams: HashMap<(i32, &str), FormTracker> = HashMap::new();
        let mut rows = Vec::with_capacity(results.len());

        for &i in &order {
            let result = &results[i];

            let driver_tracker = drivers
                .entry((result.season, result.driver.as_str()))
                .or_default();
            let driver_form = driver_tracker.snapshot();
            driver_tracker.record(result);

            let team_tracker = teams
                .entry((result.season, result.constructor.as_str()))
                .or_default();
            let team_form = team_tracker.snapshot();
            team_tracker.record(result);

            let max_round = season_max_round.get(&result.season).copied().unwrap_or(0);
            let round_norm = normalize_round(result.round, max_round);

            rows.push(FeatureRow {
                season: result.season,
                round: result.round,
                driver: result.driver.clone(),
                constructor: result.constructor.clone(),
                win: result.is_win(),
                features: FeatureVector::new(result.grid, &driver_form, &team_form, round_norm),
            });
        }

        rows
    }
}

/// Round divided by the reference max round; 0.0 without a reference
pub fn normalize_round(round: u32, max_round: u32) -> f64 {
    if max_round == 0 {
        0.0
    } else {
        round as f64 / max_round as f64
    }
}

/// Write feature rows to `features.csv`: feature columns, then `win`, then `season`
pub fn save_features<P: AsRef<Path>>(rows: &[FeatureRow], csv_path: P) -> Result<(), PolarsError> {
    let mut columns: Vec<Column> = Vec::with_capacity(FEATURE_COUNT + 2);

    for (idx, name) in FEATURE_NAMES.iter().enumerate() {
        let values: Vec<f64> = rows.iter().map(|r| r.features.to_array()[idx]).collect();
        columns.push(Column::new((*name).into(), values));
    }
    columns.push(Column::new(
        LABEL_COLUMN.into(),
        rows.iter().map(|r| r.win as i64).collect::<Vec<i64>>(),
    ));
    columns.push(Column::new(
        SEASON_COLUMN.into(),
        rows.iter().map(|r| r.season as i64).collect::<Vec<i64>>(),
    ));

    let mut df = DataFrame::new(columns)?;
    let mut file = File::create(csv_path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)
}
