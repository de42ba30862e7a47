//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Logistic loss with a reweighted positive class, row and column
//! subsampling, and exact-greedy CART trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

use super::cart::{CartBuilder, TreeConfig};
use super::dataset::{FeatureTable, SeasonSplit};
use super::gbdt::{sigmoid, GbdtModel, ModelMetadata};
use super::metrics::{evaluate, EvaluationMetrics};
use crate::data::features::FEATURE_NAMES;

/// Floor for the logistic hessian
const MIN_HESSIAN: f64 = 1e-16;

/// Training errors
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Training table is empty")]
    EmptyDataset,

    #[error("Need at least two seasons to hold one out, found {0:?}")]
    NotEnoughSeasons(Vec<i32>),

    #[error("Training table columns {found:?} do not match the model features {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// GBDT training configuration
#[derive(Clone, Debug)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled for each tree
    pub subsample: f64,
    /// Fraction of features sampled for each tree
    pub colsample: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
    pub seed: u64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 400,
            max_depth: 4,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample: 0.9,
            lambda: 2.0,
            min_child_weight: 1.0,
            seed: 42,
        }
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }

    /// Fit a binary classifier. `labels` are 0/1 and `weights` scale each
    /// row's gradient. `on_tree` is called after every finished tree.
    pub fn train<F: FnMut(usize)>(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
        weights: &[f64],
        feature_names: Vec<String>,
        mut on_tree: F,
    ) -> GbdtModel {
        let n_rows = features.len();
        let n_features = feature_names.len();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut margins = vec![0.0; n_rows];
        let mut trees = Vec::with_capacity(self.config.num_trees);

        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_child_weight: self.config.min_child_weight,
            lambda: self.config.lambda,
            learning_rate: self.config.learning_rate,
        };

        for tree_idx in 0..self.config.num_trees {
            let (gradients, hessians) = logistic_gradients(labels, weights, &margins);

            let rows = self.sample_rows(&mut rng, n_rows);
            let columns = self.sample_columns(&mut rng, n_features);

            let tree = CartBuilder::new(features, &gradients, &hessians, &columns, &tree_config)
                .build(&rows);

            for (margin, row) in margins.iter_mut().zip(features) {
                *margin += tree.evaluate(row);
            }
            trees.push(tree);

            if (tree_idx + 1) % 50 == 0 {
                info!("Trained {}/{} trees", tree_idx + 1, self.config.num_trees);
            }
            on_tree(tree_idx + 1);
        }

        GbdtModel {
            feature_names,
            base_margin: 0.0,
            trees,
            metadata: ModelMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
                num_trees: self.config.num_trees,
                max_depth: self.config.max_depth,
                learning_rate: self.config.learning_rate,
                train_rows: n_rows,
                ..ModelMetadata::default()
            },
        }
    }

    /// Bernoulli row sample; falls back to every row if nothing was drawn
    fn sample_rows(&self, rng: &mut StdRng, n_rows: usize) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n_rows).collect();
        }

        let rows: Vec<usize> = (0..n_rows)
            .filter(|_| rng.random::<f64>() < self.config.subsample)
            .collect();
        if rows.is_empty() {
            (0..n_rows).collect()
        } else {
            rows
        }
    }

    /// Sorted feature indices, at least one
    fn sample_columns(&self, rng: &mut StdRng, n_features: usize) -> Vec<usize> {
        if self.config.colsample >= 1.0 || n_features == 0 {
            return (0..n_features).collect();
        }

        let amount = ((n_features as f64 * self.config.colsample).floor() as usize).clamp(1, n_features);
        let mut columns = rand::seq::index::sample(rng, n_features, amount).into_vec();
        columns.sort_unstable();
        columns
    }
}

/// Weighted logistic-loss gradient and hessian per row
fn logistic_gradients(labels: &[f64], weights: &[f64], margins: &[f64]) -> (Vec<f64>, Vec<f64>) {
    labels
        .iter()
        .zip(weights)
        .zip(margins)
        .map(|((&y, &w), &m)| {
            let p = sigmoid(m);
            (w * (p - y), w * (p * (1.0 - p)).max(MIN_HESSIAN))
        })
        .unzip()
}

/// negatives / max(positives, 1)
pub fn scale_pos_weight(labels: &[f64]) -> f64 {
    let positives = labels.iter().filter(|&&y| y > 0.5).count();
    let negatives = labels.len() - positives;
    negatives as f64 / positives.max(1) as f64
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: GbdtModel,
    pub split: SeasonSplit,
    pub scale_pos_weight: f64,
    pub test_metrics: EvaluationMetrics,
}

/// Train the win classifier: earlier seasons train, the latest season is
/// held out for evaluation.
pub fn train_win_model<F: FnMut(usize)>(
    table: &FeatureTable,
    config: GbdtConfig,
    on_tree: F,
) -> Result<TrainingReport, TrainError> {
    if table.is_empty() {
        return Err(TrainError::EmptyDataset);
    }

    let expected: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    if table.feature_names != expected {
        return Err(TrainError::FeatureMismatch {
            expected,
            found: table.feature_names.clone(),
        });
    }

    let split = table
        .season_split()
        .ok_or_else(|| TrainError::NotEnoughSeasons(table.seasons()))?;

    let (train_x, train_y) = table.select(&split.train);
    let (test_x, test_y) = table.select(&split.test);

    let pos_weight = scale_pos_weight(&train_y);
    let weights: Vec<f64> = train_y
        .iter()
        .map(|&y| if y > 0.5 { pos_weight } else { 1.0 })
        .collect();

    info!(
        "Training on seasons {:?} ({} rows), holding out {} ({} rows), scale_pos_weight={:.2}",
        split.train_seasons,
        train_x.len(),
        split.test_season,
        test_x.len(),
        pos_weight
    );

    let trainer = GbdtTrainer::new(config);
    let mut model = trainer.train(&train_x, &train_y, &weights, expected, on_tree);

    let test_metrics = evaluate(&test_y, &model.predict_batch(&test_x));
    info!(
        "Held-out {}: accuracy={:.4}, auc={}, log_loss={:.4}",
        split.test_season,
        test_metrics.accuracy,
        test_metrics
            .roc_auc
            .map(|auc| format!("{:.4}", auc))
            .unwrap_or_else(|| "n/a".to_string()),
        test_metrics.log_loss
    );

    model.metadata.scale_pos_weight = pos_weight;
    model.metadata.train_seasons = split.train_seasons.clone();
    model.metadata.test_season = Some(split.test_season);
    model.metadata.test_metrics = Some(test_metrics.clone());

    Ok(TrainingReport {
        model,
        split,
        scale_pos_weight: pos_weight,
        test_metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pole sitters win; everyone else does not
    fn grid_table(seasons: &[i32]) -> FeatureTable {
        let mut table = FeatureTable {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            ..FeatureTable::default()
        };

        for &season in seasons {
            for round in 1..=6 {
                for grid in 1..=10 {
                    let mut row = vec![0.0; FEATURE_NAMES.len()];
                    row[0] = grid as f64;
                    row[7] = round as f64 / 6.0;
                    table.features.push(row);
                    table.labels.push(if grid == 1 { 1.0 } else { 0.0 });
                    table.seasons.push(season);
                }
            }
        }
        table
    }

    fn small_config() -> GbdtConfig {
        GbdtConfig {
            num_trees: 30,
            learning_rate: 0.3,
            ..GbdtConfig::default()
        }
    }

    #[test]
    fn test_scale_pos_weight() {
        assert_eq!(scale_pos_weight(&[1.0, 0.0, 0.0, 0.0]), 3.0);
        assert_eq!(scale_pos_weight(&[0.0, 0.0]), 2.0);
        assert_eq!(scale_pos_weight(&[]), 0.0);
    }

    #[test]
    fn test_logistic_gradients() {
        let (g, h) = logistic_gradients(&[1.0, 0.0], &[2.0, 1.0], &[0.0, 0.0]);
        assert_eq!(g, vec![-1.0, 0.5]);
        assert_eq!(h, vec![0.5, 0.25]);
    }

    #[test]
    fn test_learns_pole_position() {
        let table = grid_table(&[2021, 2022, 2023]);
        let report = train_win_model(&table, small_config(), |_| {}).unwrap();

        assert_eq!(report.split.test_season, 2023);
        assert_eq!(report.scale_pos_weight, 9.0);
        assert_eq!(report.model.trees.len(), 30);
        assert_eq!(report.test_metrics.roc_auc, Some(1.0));

        let pole = report.model.predict_proba(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5]);
        let back = report.model.predict_proba(&[9.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5]);
        assert!(pole > 0.5);
        assert!(back < 0.5);
    }

    #[test]
    fn test_training_is_deterministic() {
        let table = grid_table(&[2022, 2023]);
        let a = train_win_model(&table, small_config(), |_| {}).unwrap();
        let b = train_win_model(&table, small_config(), |_| {}).unwrap();
        assert_eq!(a.model.trees, b.model.trees);
    }

    #[test]
    fn test_progress_callback() {
        let table = grid_table(&[2022, 2023]);
        let mut finished = 0;
        train_win_model(&table, small_config(), |n| finished = n).unwrap();
        assert_eq!(finished, 30);
    }

    #[test]
    fn test_rejects_single_season() {
        let table = grid_table(&[2023]);
        let err = train_win_model(&table, small_config(), |_| {}).unwrap_err();
        assert!(matches!(err, TrainError::NotEnoughSeasons(seasons) if seasons == vec![2023]));
    }

    #[test]
    fn test_rejects_empty_and_mismatched_tables() {
        let err = train_win_model(&FeatureTable::default(), small_config(), |_| {}).unwrap_err();
        assert!(matches!(err, TrainError::EmptyDataset));

        let mut table = grid_table(&[2022, 2023]);
        table.feature_names.swap(0, 1);
        let err = train_win_model(&table, small_config(), |_| {}).unwrap_err();
        assert!(matches!(err, TrainError::FeatureMismatch { .. }));
    }

    #[test]
    fn test_column_sample_size() {
        let trainer = GbdtTrainer::new(GbdtConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        let columns = trainer.sample_columns(&mut rng, 8);

        assert_eq!(columns.len(), 7);
        assert!(columns.windows(2).all(|w| w[0] < w[1]));
    }
}
