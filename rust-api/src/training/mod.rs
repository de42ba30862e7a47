//! Win classifier training
//!
//! Gradient boosted trees fit on `features.csv`, evaluated on the latest
//! season.

pub mod cart;
pub mod dataset;
pub mod gbdt;
pub mod metrics;
pub mod trainer;

pub use dataset::{FeatureTable, SeasonSplit};
pub use gbdt::{GbdtModel, ModelMetadata, Node, Tree};
pub use metrics::{evaluate, EvaluationMetrics};
pub use trainer::{scale_pos_weight, train_win_model, GbdtConfig, GbdtTrainer, TrainError, TrainingReport};
