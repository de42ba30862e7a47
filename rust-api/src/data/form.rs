//! Prior-form aggregation
//!
//! Cumulative and rolling statistics over one group's results (a driver or a
//! constructor within a season), always computed from rows strictly before
//! the one being described. Both the offline feature builder and the live
//! builder go through [`FormTracker`], which keeps their numbers identical.

use std::collections::VecDeque;

use crate::data::results::ResultRecord;

/// Number of prior races in the rolling window
pub const ROLLING_WINDOW: usize = 5;

/// Statistics describing a group's form before some round
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriorForm {
    /// Sum of points in all prior rows
    pub points_to_date: f64,
    /// Mean points over the last `ROLLING_WINDOW` prior rows
    pub rolling_points: f64,
    /// Mean finishing position over the last `ROLLING_WINDOW` prior rows
    pub rolling_position: f64,
    /// DNF rate over the last `ROLLING_WINDOW` prior rows
    pub rolling_dnf: f64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    points: f64,
    position: f64,
    dnf: f64,
}

/// Running state for one group, fed in round order
#[derive(Debug, Clone, Default)]
pub struct FormTracker {
    points_to_date: f64,
    recent: VecDeque<Sample>,
}

impl FormTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form before the next row. All zeros until something has been recorded.
    pub fn snapshot(&self) -> PriorForm {
        if self.recent.is_empty() {
            return PriorForm::default();
        }

        let n = self.recent.len() as f64;
        let mean = |f: fn(&Sample) -> f64| self.recent.iter().map(f).sum::<f64>() / n;

        PriorForm {
            points_to_date: self.points_to_date,
            rolling_points: mean(|s| s.points),
            rolling_position: mean(|s| s.position),
            rolling_dnf: mean(|s| s.dnf),
        }
    }

    /// Add a row after it has been described
    pub fn record(&mut self, result: &ResultRecord) {
        self.points_to_date += result.points;

        if self.recent.len() == ROLLING_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(Sample {
            points: result.points,
            position: result.position as f64,
            dnf: if result.is_dnf() { 1.0 } else { 0.0 },
        });
    }
}

/// Prior form for every row of an ordered group
pub fn prior_form<'a, I>(results: I) -> Vec<PriorForm>
where
    I: IntoIterator<Item = &'a ResultRecord>,
{
    let mut tracker = FormTracker::new();
    results
        .into_iter()
        .map(|result| {
            let form = tracker.snapshot();
            tracker.record(result);
            form
        })
        .collect()
}

/// Form after all rows of an ordered group, i.e. before the round that follows
pub fn form_after<'a, I>(results: I) -> PriorForm
where
    I: IntoIterator<Item = &'a ResultRecord>,
{
    let mut tracker = FormTracker::new();
    for result in results {
        tracker.record(result);
    }
    tracker.snapshot()
}
