//! Race results: record type, DNF heuristic and `results.csv` storage

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// One driver's classified result in one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub season: i32,
    pub round: u32,
    pub race: String,
    pub driver: String,
    pub constructor: String,
    pub position: u32,
    pub grid: u32,
    pub points: f64,
    pub status: String,
}

impl ResultRecord {
    pub fn is_dnf(&self) -> bool {
        status_is_dnf(&self.status)
    }

    pub fn is_win(&self) -> bool {
        self.position == 1
    }
}

/// DNF flag derived from the free-text status.
///
/// A status counts as finished when it mentions "finish", a "+" (lap-count
/// suffix such as "+1 Lap") or "lap". Anything else is a DNF. The "+" rule
/// also matches unrelated statuses; the trained model was fit on exactly this
/// labelling so it must not change.
pub fn status_is_dnf(status: &str) -> bool {
    let status = status.to_lowercase();
    let finished = status.contains("finish") || status.contains('+') || status.contains("lap");
    !finished
}

/// Load all result records from `results.csv`
pub fn load_results<P: AsRef<Path>>(csv_path: P) -> Result<Vec<ResultRecord>, PolarsError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(csv_path.as_ref().to_path_buf()))?
        .finish()?;

    dataframe_to_results(&df)
}

/// Write result records to `results.csv`
pub fn save_results<P: AsRef<Path>>(records: &[ResultRecord], csv_path: P) -> Result<(), PolarsError> {
    let mut df = results_to_dataframe(records)?;
    let mut file = File::create(csv_path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)
}

fn results_to_dataframe(records: &[ResultRecord]) -> PolarsResult<DataFrame> {
    df!(
        "season" => records.iter().map(|r| r.season as i64).collect::<Vec<i64>>(),
        "round" => records.iter().map(|r| r.round as i64).collect::<Vec<i64>>(),
        "race" => records.iter().map(|r| r.race.clone()).collect::<Vec<String>>(),
        "driver" => records.iter().map(|r| r.driver.clone()).collect::<Vec<String>>(),
        "constructor" => records.iter().map(|r| r.constructor.clone()).collect::<Vec<String>>(),
        "position" => records.iter().map(|r| r.position as i64).collect::<Vec<i64>>(),
        "grid" => records.iter().map(|r| r.grid as i64).collect::<Vec<i64>>(),
        "points" => records.iter().map(|r| r.points).collect::<Vec<f64>>(),
        "status" => records.iter().map(|r| r.status.clone()).collect::<Vec<String>>(),
    )
}

fn dataframe_to_results(df: &DataFrame) -> Result<Vec<ResultRecord>, PolarsError> {
    let seasons = i64_values(df, "season")?;
    let rounds = i64_values(df, "round")?;
    let races = str_values(df, "race")?;
    let drivers = str_values(df, "driver")?;
    let constructors = str_values(df, "constructor")?;
    let positions = i64_values(df, "position")?;
    let grids = i64_values(df, "grid")?;
    let points = f64_values(df, "points")?;
    let statuses = str_values(df, "status")?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        records.push(ResultRecord {
            season: seasons[i] as i32,
            round: rounds[i].max(0) as u32,
            race: races[i].clone(),
            driver: drivers[i].clone(),
            constructor: constructors[i].clone(),
            position: positions[i].max(0) as u32,
            grid: grids[i].max(0) as u32,
            points: points[i],
            status: statuses[i].clone(),
        });
    }

    Ok(records)
}

// CSV type inference depends on the data (e.g. whole-number points read as
// integers), so every column is cast before it is read.

pub(crate) fn i64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<i64>> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().map(|v| v.unwrap_or(0)).collect())
}

pub(crate) fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

pub(crate) fn str_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}
