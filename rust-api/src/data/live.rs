//! Live feature builder
//!
//! Rebuilds the training feature vector for an upcoming round from the
//! season's results before that round.

use std::collections::HashMap;

use tracing::debug;

use crate::data::features::{normalize_round, FeatureVector};
use crate::data::form::{FormTracker, PriorForm};
use crate::data::results::ResultRecord;
use crate::models::RaceEntry;

/// An entry with its model input
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFeatures {
    pub entry: RaceEntry,
    pub season: i32,
    pub features: FeatureVector,
}

/// Build features for `entries` racing in `season`, round `target_round`.
///
/// Only rows of `season` with a round strictly below `target_round` are used,
/// whatever else `history` holds. Driver and constructor form are looked up
/// independently; a name with no prior rows gets zero form.
pub fn build_live_features(
    history: &[ResultRecord],
    season: i32,
    target_round: u32,
    entries: &[RaceEntry],
) -> Vec<LiveFeatures> {
    let mut prior: Vec<&ResultRecord> = history
        .iter()
        .filter(|r| r.season == season && r.round < target_round)
        .collect();
    prior.sort_by_key(|r| r.round);

    if prior.is_empty() {
        debug!(season, target_round, "No prior results, using zero features");
        return entries
            .iter()
            .map(|entry| LiveFeatures {
                entry: entry.clone(),
                season,
                features: FeatureVector {
                    grid: entry.grid as f64,
                    ..FeatureVector::default()
                },
            })
            .collect();
    }

    let mut drivers: HashMap<&str, FormTracker> = HashMap::new();
    let mut teams: HashMap<&str, FormTracker> = HashMap::new();
    let mut max_round = 0;
    for result in &prior {
        drivers.entry(result.driver.as_str()).or_default().record(result);
        teams.entry(result.constructor.as_str()).or_default().record(result);
        max_round = max_round.max(result.round);
    }

    let round_norm = normalize_round(target_round, max_round);

    entries
        .iter()
        .map(|entry| {
            let driver_form = form_of(&drivers, &entry.driver);
            let team_form = form_of(&teams, &entry.constructor);
            LiveFeatures {
                entry: entry.clone(),
                season,
                features: FeatureVector::new(entry.grid, &driver_form, &team_form, round_norm),
            }
        })
        .collect()
}

fn form_of(trackers: &HashMap<&str, FormTracker>, key: &str) -> PriorForm {
    trackers
        .get(key)
        .map(FormTracker::snapshot)
        .unwrap_or_default()
}
