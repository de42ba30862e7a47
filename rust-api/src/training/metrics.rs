//! Evaluation Metrics
//!
//! Accuracy, ROC AUC and log-loss for the held-out season.

use serde::{Deserialize, Serialize};

const LOG_LOSS_EPS: f64 = 1e-15;

/// Held-out evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rows: usize,
    pub positives: usize,
    pub accuracy: f64,
    /// None when the evaluation set holds a single class
    pub roc_auc: Option<f64>,
    pub log_loss: f64,
}

/// Calculate metrics from labels (0/1) and predicted probabilities
pub fn evaluate(labels: &[f64], probabilities: &[f64]) -> EvaluationMetrics {
    if labels.is_empty() {
        return EvaluationMetrics::default();
    }

    EvaluationMetrics {
        rows: labels.len(),
        positives: labels.iter().filter(|&&y| y > 0.5).count(),
        accuracy: accuracy(labels, probabilities),
        roc_auc: roc_auc(labels, probabilities),
        log_loss: log_loss(labels, probabilities),
    }
}

/// Share of rows where `p >= 0.5` agrees with the label
pub fn accuracy(labels: &[f64], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }

    let correct = labels
        .iter()
        .zip(probabilities)
        .filter(|(&y, &p)| (p >= 0.5) == (y > 0.5))
        .count();
    correct as f64 / labels.len() as f64
}

/// Rank-based ROC AUC with tied scores sharing their average rank
pub fn roc_auc(labels: &[f64], probabilities: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&y| y > 0.5).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && probabilities[order[end + 1]] == probabilities[order[start]] {
            end += 1;
        }

        // Ranks are 1-based
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if labels[idx] > 0.5 {
                positive_rank_sum += average_rank;
            }
        }
        start = end + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Mean binary cross-entropy with probabilities clipped away from 0 and 1
pub fn log_loss(labels: &[f64], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }

    let total: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(&y, &p)| {
            let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len() as f64
}
