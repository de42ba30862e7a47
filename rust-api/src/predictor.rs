use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::data::features::{feature_names, FeatureVector, FEATURE_COUNT};
use crate::training::GbdtModel;

/// Serialized trees
pub const MODEL_FILE: &str = "model.json";
/// Ordered feature names the model was fit on
pub const FEATURES_FILE: &str = "features.json";

/// Model artifact errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Feature order mismatch: {context} lists {found:?}, expected {expected:?}")]
    FeatureOrder {
        context: &'static str,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Feature keys rejected (missing: {missing:?}, unexpected: {unexpected:?})")]
    FeatureKeys {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

impl ModelError {
    /// True when the artifacts are simply absent
    pub fn is_missing(&self) -> bool {
        matches!(self, ModelError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Win probability model loaded once at startup
#[derive(Debug, Clone)]
pub struct WinPredictor {
    model: GbdtModel,
    feature_order: Vec<String>,
}

impl WinPredictor {
    /// Load `model.json` and `features.json` from `model_dir`.
    ///
    /// The persisted feature list, the model's own list and the live feature
    /// builder's order must all agree.
    pub fn load<P: AsRef<Path>>(model_dir: P) -> Result<Self, ModelError> {
        let model_dir = model_dir.as_ref();

        let model_path = model_dir.join(MODEL_FILE);
        info!("Loading model: {:?}", model_path);
        let model: GbdtModel = read_json(&model_path)?;

        let features_path = model_dir.join(FEATURES_FILE);
        let feature_order: Vec<String> = read_json(&features_path)?;

        if model.feature_names != feature_order {
            return Err(ModelError::FeatureOrder {
                context: "model.json",
                expected: feature_order,
                found: model.feature_names,
            });
        }

        let predictor = Self::from_model(model)?;
        info!(
            "Loaded model with {} trees over {} features",
            predictor.model.trees.len(),
            predictor.feature_order.len()
        );
        Ok(predictor)
    }

    /// Wrap an in-memory model, checking its feature order
    pub fn from_model(model: GbdtModel) -> Result<Self, ModelError> {
        let expected = feature_names();
        if model.feature_names != expected {
            return Err(ModelError::FeatureOrder {
                context: "features.json",
                expected,
                found: model.feature_names,
            });
        }

        Ok(Self {
            feature_order: model.feature_names.clone(),
            model,
        })
    }

    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    pub fn model(&self) -> &GbdtModel {
        &self.model
    }

    /// Win probability for one feature vector
    pub fn predict_proba(&self, features: &FeatureVector) -> f64 {
        self.model.predict_proba(&features.to_array())
    }

    /// Win probability for a name -> value map. Every model feature must be
    /// present and no other key is accepted.
    pub fn predict_from_map(&self, values: &HashMap<String, f64>) -> Result<f64, ModelError> {
        let missing: Vec<String> = self
            .feature_order
            .iter()
            .filter(|name| !values.contains_key(*name))
            .cloned()
            .collect();
        let mut unexpected: Vec<String> = values
            .keys()
            .filter(|key| !self.feature_order.contains(*key))
            .cloned()
            .collect();
        unexpected.sort();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(ModelError::FeatureKeys { missing, unexpected });
        }

        let mut row = [0.0; FEATURE_COUNT];
        for (slot, name) in row.iter_mut().zip(&self.feature_order) {
            *slot = values[name];
        }
        Ok(self.model.predict_proba(&row))
    }
}

/// Write `model.json` and `features.json` into `model_dir`
pub fn save_artifacts<P: AsRef<Path>>(model: &GbdtModel, model_dir: P) -> Result<(), ModelError> {
    let model_dir = model_dir.as_ref();
    std::fs::create_dir_all(model_dir).map_err(|source| ModelError::Io {
        path: model_dir.to_path_buf(),
        source,
    })?;

    write_json(&model_dir.join(MODEL_FILE), model)?;
    write_json(&model_dir.join(FEATURES_FILE), &model.feature_names)?;
    Ok(())
}

/// Round to 3 decimal places
pub fn round_probability(p: f64) -> f64 {
    (p * 1000.0).round() / 1000.0
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let file = File::open(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ModelError> {
    let file = File::create(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })
}
