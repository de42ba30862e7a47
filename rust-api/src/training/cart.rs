//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy, second-order tree construction over gradient/hessian pairs.

use super::gbdt::{Node, Tree};

/// Smallest gain worth a split
const MIN_SPLIT_GAIN: f64 = 1e-6;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Shrinkage applied to every leaf value
    pub learning_rate: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_child_weight: 1.0,
            lambda: 2.0,
            learning_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Builds one tree from per-row gradient statistics
pub struct CartBuilder<'a> {
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    columns: &'a [usize],
    config: &'a TreeConfig,
}

impl<'a> CartBuilder<'a> {
    /// `columns` restricts the candidate split features
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        columns: &'a [usize],
        config: &'a TreeConfig,
    ) -> Self {
        Self {
            features,
            gradients,
            hessians,
            columns,
            config,
        }
    }

    /// Build a tree over the given rows
    pub fn build(&self, rows: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, &mut nodes);
        Tree { nodes }
    }

    fn build_node(&self, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let current_idx = nodes.len();
        let (sum_g, sum_h) = self.sum_stats(rows);

        let split = if depth < self.config.max_depth {
            self.find_best_split(rows, sum_g, sum_h)
        } else {
            None
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(self.leaf_value(sum_g, sum_h)));
            return current_idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| self.features[i][split.feature_idx] < split.threshold);

        // Reserve space for current node
        nodes.push(Node {
            feature_index: split.feature_idx,
            threshold: split.threshold,
            left: 0,
            right: 0,
            value: None,
        });

        let left_idx = self.build_node(&left_rows, depth + 1, nodes);
        let right_idx = self.build_node(&right_rows, depth + 1, nodes);

        nodes[current_idx].left = left_idx;
        nodes[current_idx].right = right_idx;

        current_idx
    }

    /// Scan every allowed feature in sorted order; thresholds sit halfway
    /// between consecutive distinct values. The first best split wins ties.
    fn find_best_split(&self, rows: &[usize], sum_g: f64, sum_h: f64) -> Option<SplitCandidate> {
        let parent_score = self.score(sum_g, sum_h);
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();

        for &feature_idx in self.columns {
            let value = |i: usize| self.features[i][feature_idx];
            sorted.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

            let mut left_g = 0.0;
            let mut left_h = 0.0;

            for pos in 0..sorted.len().saturating_sub(1) {
                let i = sorted[pos];
                left_g += self.gradients[i];
                left_h += self.hessians[i];

                let current = value(i);
                let next = value(sorted[pos + 1]);
                if current == next {
                    continue;
                }

                let right_g = sum_g - left_g;
                let right_h = sum_h - left_h;
                if left_h < self.config.min_child_weight || right_h < self.config.min_child_weight {
                    continue;
                }

                let gain = 0.5
                    * (self.score(left_g, left_h) + self.score(right_g, right_h) - parent_score);
                if gain <= MIN_SPLIT_GAIN {
                    continue;
                }

                if best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: current + (next - current) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    /// Shrunk optimal leaf weight: -eta * G / (H + lambda)
    fn leaf_value(&self, sum_g: f64, sum_h: f64) -> f64 {
        -self.config.learning_rate * sum_g / (sum_h + self.config.lambda)
    }

    fn sum_stats(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        })
    }
}
