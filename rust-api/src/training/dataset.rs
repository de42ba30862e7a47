//! Training table loading and season split

use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

use crate::data::features::{FeatureRow, FEATURE_NAMES, LABEL_COLUMN, SEASON_COLUMN};
use crate::data::results::{f64_values, i64_values};

/// Feature matrix with labels and the season of each row
#[derive(Clone, Debug, Default)]
pub struct FeatureTable {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    pub seasons: Vec<i32>,
}

/// Row indices of the training seasons and the held-out season
#[derive(Clone, Debug, PartialEq)]
pub struct SeasonSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub train_seasons: Vec<i32>,
    pub test_season: i32,
}

impl FeatureTable {
    /// Load `features.csv`. Every column other than `win` and `season` is a
    /// feature, in file order.
    pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self, PolarsError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(csv_path.as_ref().to_path_buf()))?
            .finish()?;

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| name != LABEL_COLUMN && name != SEASON_COLUMN)
            .collect();

        let columns = feature_names
            .iter()
            .map(|name| f64_values(&df, name))
            .collect::<PolarsResult<Vec<_>>>()?;
        let labels = f64_values(&df, LABEL_COLUMN)?;
        let seasons = i64_values(&df, SEASON_COLUMN)?
            .into_iter()
            .map(|s| s as i32)
            .collect();

        let features = (0..df.height())
            .map(|row| columns.iter().map(|column| column[row]).collect())
            .collect();

        Ok(Self {
            feature_names,
            features,
            labels,
            seasons,
        })
    }

    /// Table built straight from offline feature rows
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            features: rows.iter().map(|r| r.features.to_array().to_vec()).collect(),
            labels: rows.iter().map(|r| if r.win { 1.0 } else { 0.0 }).collect(),
            seasons: rows.iter().map(|r| r.season).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Distinct seasons, ascending
    pub fn seasons(&self) -> Vec<i32> {
        self.seasons
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Hold out the latest season; train on every earlier one.
    /// None with fewer than two seasons.
    pub fn season_split(&self) -> Option<SeasonSplit> {
        let seasons = self.seasons();
        let (&test_season, earlier) = seasons.split_last()?;
        if earlier.is_empty() {
            return None;
        }

        let (test, train): (Vec<usize>, Vec<usize>) =
            (0..self.len()).partition(|&i| self.seasons[i] == test_season);

        Some(SeasonSplit {
            train,
            test,
            train_seasons: earlier.to_vec(),
            test_season,
        })
    }

    /// Features and labels of the given rows
    pub fn select(&self, rows: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let features = rows.iter().map(|&i| self.features[i].clone()).collect();
        let labels = rows.iter().map(|&i| self.labels[i]).collect();
        (features, labels)
    }
}
