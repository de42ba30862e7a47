//! Gradient boosted tree model
//!
//! Binary classifier: the raw margin is the base margin plus the sum of tree
//! outputs, and the probability is its logistic transform.

use serde::{Deserialize, Serialize};

use super::metrics::EvaluationMetrics;

/// Tree node. Leaves carry `value`; internal nodes route samples with
/// `x[feature_index] < threshold` to `left` and everything else to `right`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub feature_index: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub value: Option<f64>,
}

impl Node {
    pub fn leaf(value: f64) -> Self {
        Self {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }
}

/// Regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf output for one sample
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if let Some(value) = node.value {
                return value;
            }

            let Some(&x) = features.get(node.feature_index) else {
                return 0.0;
            };

            idx = if x < node.threshold { node.left } else { node.right };
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(tree: &Tree, idx: usize) -> usize {
            match tree.nodes.get(idx) {
                Some(node) if node.value.is_none() => {
                    1 + walk(tree, node.left).max(walk(tree, node.right))
                }
                _ => 0,
            }
        }
        walk(self, 0)
    }
}

/// Training provenance stored with the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub created_at: String,
    pub num_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub scale_pos_weight: f64,
    pub train_seasons: Vec<i32>,
    pub test_season: Option<i32>,
    pub train_rows: usize,
    pub test_metrics: Option<EvaluationMetrics>,
}

/// Trained classifier. Leaf values already include the learning rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtModel {
    pub feature_names: Vec<String>,
    pub base_margin: f64,
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub metadata: ModelMetadata,
}

impl GbdtModel {
    /// Raw log-odds for one sample
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.evaluate(features)).sum::<f64>()
    }

    /// Probability of the positive class for one sample
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_proba(row)).collect()
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// grid < 3.5 ? +1.0 : -1.0
    fn stump() -> Tree {
        Tree {
            nodes: vec![
                Node {
                    feature_index: 0,
                    threshold: 3.5,
                    left: 1,
                    right: 2,
                    value: None,
                },
                Node::leaf(1.0),
                Node::leaf(-1.0),
            ],
        }
    }

    #[test]
    fn test_tree_routing() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[1.0]), 1.0);
        assert_eq!(tree.evaluate(&[3.5]), -1.0);
        assert_eq!(tree.evaluate(&[10.0]), -1.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_missing_feature_contributes_nothing() {
        assert_eq!(stump().evaluate(&[]), 0.0);
    }

    #[test]
    fn test_model_probability() {
        let model = GbdtModel {
            feature_names: vec!["grid".to_string()],
            base_margin: 0.0,
            trees: vec![stump(), stump()],
            metadata: ModelMetadata::default(),
        };

        assert_eq!(model.margin(&[1.0]), 2.0);
        assert!((model.predict_proba(&[1.0]) - sigmoid(2.0)).abs() < 1e-12);
        assert!(model.predict_proba(&[1.0]) > model.predict_proba(&[8.0]));

        let batch = model.predict_batch(&[vec![1.0], vec![8.0]]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 0.001);
    }

    #[test]
    fn test_model_json_roundtrip() {
        let model = GbdtModel {
            feature_names: vec!["grid".to_string()],
            base_margin: -0.25,
            trees: vec![stump()],
            metadata: ModelMetadata {
                num_trees: 1,
                ..ModelMetadata::default()
            },
        };

        let json = serde_json::to_string(&model).unwrap();
        let restored: GbdtModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, model);
    }
}
