//! F1 Predictor - race winner prediction
//!
//! This library provides:
//! - An Ergast-compatible results API client
//! - Offline and live feature builders sharing one rolling-form aggregation
//! - A gradient boosted tree trainer and evaluator
//! - The win probability predictor and the HTTP service behind it
//!
//! # Example
//!
//! ```no_run
//! use f1_predictor::data::build_live_features;
//! use f1_predictor::models::RaceEntry;
//! use f1_predictor::predictor::WinPredictor;
//!
//! let predictor = WinPredictor::load("models").unwrap();
//! let entries = vec![RaceEntry {
//!     driver: "Max Verstappen".to_string(),
//!     constructor: "Red Bull".to_string(),
//!     grid: 1,
//! }];
//!
//! for live in build_live_features(&[], 2024, 1, &entries) {
//!     println!("{}: {:.3}", live.entry.driver, predictor.predict_proba(&live.features));
//! }
//! ```

pub mod config;
pub mod data;
pub mod ergast;
pub mod models;
pub mod predictor;
pub mod service;
pub mod training;

// API-specific modules (only available with api feature)
#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod handlers;

// Re-export commonly used types
pub use config::ServerConfig;
pub use data::{FeatureBuilder, FeatureVector, ResultRecord, FEATURE_NAMES};
pub use ergast::{ErgastClient, InMemorySource, RaceDataSource};
pub use models::{DriverPrediction, RaceEntry, RaceMeta};
pub use predictor::WinPredictor;
