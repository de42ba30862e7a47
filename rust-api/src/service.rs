//! Prediction service
//!
//! Per-request orchestration behind the HTTP handlers: resolve the next race,
//! resolve or validate its entry list, rebuild live features and score them.
//! Nothing is cached between requests.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::data::live::build_live_features;
use crate::ergast::{ApiError, RaceDataSource};
use crate::models::{
    DriverPrediction, EntryError, EntryIssue, FeatureRequest, GridRow, RaceEntry, RaceMeta,
    RosterResponse,
};
use crate::predictor::{round_probability, ModelError, WinPredictor};

/// Shown when the next race has no qualifying result yet
pub const AWAITING_QUALIFYING_MESSAGE: &str =
    "Qualifying not available yet; use /api/next-roster and POST /api/predict-next-race-with-grid";

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Results API unavailable: {0}")]
    Upstream(#[from] ApiError),

    #[error("{} grid entries failed validation", .0.len())]
    Validation(Vec<EntryError>),

    #[error("Missing grid: expected {{\"grid\": [{{\"driver\": \"...\", \"grid\": 1}}]}}")]
    MissingGrid,

    #[error("No model loaded")]
    ModelUnavailable,

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Canonical driver -> constructor map for the next race
pub type EntryMap = HashMap<String, String>;

/// Outcome of the automatic next-race prediction
#[derive(Debug, Clone, PartialEq)]
pub enum AutoPrediction {
    NoUpcomingRace,
    /// Race known, qualifying not run yet
    AwaitingQualifying(RaceMeta),
    Ready {
        race: RaceMeta,
        predictions: Vec<DriverPrediction>,
    },
}

/// Outcome of a prediction for a caller-supplied grid
#[derive(Debug, Clone, PartialEq)]
pub enum GridPrediction {
    NoUpcomingRace,
    /// Neither qualifying nor standings list any driver
    NoRoster,
    Ready {
        race: RaceMeta,
        predictions: Vec<DriverPrediction>,
    },
}

/// Grid value as a non-negative integer. Accepts JSON integers, whole
/// floats and numeric strings.
pub fn parse_grid_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                u32::try_from(v).ok()
            } else if let Some(v) = n.as_f64() {
                let whole = v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64;
                whole.then_some(v as u32)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn driver_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Validate every row. Constructors always come from `entry_map`; any
/// error rejects the whole grid.
pub fn validate_grid(rows: &[GridRow], entry_map: &EntryMap) -> Result<Vec<RaceEntry>, Vec<EntryError>> {
    let mut entries = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let driver = driver_name(&row.driver);

        let Some(constructor) = entry_map.get(&driver) else {
            errors.push(EntryError {
                index,
                driver,
                issue: EntryIssue::UnknownDriver,
            });
            continue;
        };

        let Some(grid) = parse_grid_value(&row.grid) else {
            errors.push(EntryError {
                index,
                driver,
                issue: EntryIssue::InvalidGrid,
            });
            continue;
        };

        entries.push(RaceEntry {
            constructor: constructor.clone(),
            driver,
            grid,
        });
    }

    if errors.is_empty() {
        Ok(entries)
    } else {
        Err(errors)
    }
}

/// Sort by descending probability; ties keep their order
pub fn rank_predictions(mut predictions: Vec<DriverPrediction>) -> Vec<DriverPrediction> {
    predictions.sort_by(|a, b| b.win_probability.total_cmp(&a.win_probability));
    predictions
}

/// Driver -> constructor map: next-race qualifying first, current standings
/// when qualifying is empty or unavailable
pub async fn resolve_entry_map(source: &dyn RaceDataSource) -> Result<EntryMap, ServiceError> {
    match source.next_qualifying().await {
        Ok(entries) if !entries.is_empty() => {
            return Ok(entries
                .into_iter()
                .map(|e| (e.driver, e.constructor))
                .collect());
        }
        Ok(_) => {}
        Err(e) => warn!("Qualifying unavailable, falling back to standings: {}", e),
    }

    let standings = source.driver_standings().await?;
    Ok(standings
        .into_iter()
        .map(|s| (s.driver, s.constructor))
        .collect())
}

/// Score entries for `race` using the season's results before it
pub async fn predict_entries(
    source: &dyn RaceDataSource,
    predictor: &WinPredictor,
    race: &RaceMeta,
    entries: &[RaceEntry],
) -> Result<Vec<DriverPrediction>, ServiceError> {
    let history = source.season_results(race.season).await?;
    let live = build_live_features(&history, race.season, race.round, entries);

    let predictions = live
        .into_iter()
        .map(|l| DriverPrediction {
            win_probability: round_probability(predictor.predict_proba(&l.features)),
            driver: l.entry.driver,
            constructor: l.entry.constructor,
            grid: l.entry.grid,
        })
        .collect();

    Ok(rank_predictions(predictions))
}

pub async fn next_race(source: &dyn RaceDataSource) -> Result<Option<RaceMeta>, ServiceError> {
    Ok(source.next_race().await?)
}

/// Qualifying order of the next race; empty before qualifying
pub async fn next_grid(source: &dyn RaceDataSource) -> Result<Vec<RaceEntry>, ServiceError> {
    Ok(source.next_qualifying().await?)
}

/// Next race with the current standings as its roster
pub async fn next_roster(source: &dyn RaceDataSource) -> Result<Option<RosterResponse>, ServiceError> {
    let Some(race) = source.next_race().await? else {
        return Ok(None);
    };
    let drivers = source.driver_standings().await?;
    Ok(Some(RosterResponse { race, drivers }))
}

/// Predict the next race from its qualifying order
pub async fn predict_next_race(
    source: &dyn RaceDataSource,
    predictor: Option<&WinPredictor>,
) -> Result<AutoPrediction, ServiceError> {
    let predictor = predictor.ok_or(ServiceError::ModelUnavailable)?;

    let Some(race) = source.next_race().await? else {
        return Ok(AutoPrediction::NoUpcomingRace);
    };

    let entries = match source.next_qualifying().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Qualifying unavailable for {} {}: {}", race.season, race.race_name, e);
            return Ok(AutoPrediction::AwaitingQualifying(race));
        }
    };
    if entries.is_empty() {
        info!("No qualifying yet for {} {}", race.season, race.race_name);
        return Ok(AutoPrediction::AwaitingQualifying(race));
    }

    let predictions = predict_entries(source, predictor, &race, &entries).await?;
    Ok(AutoPrediction::Ready { race, predictions })
}

/// Predict the next race from a caller-supplied grid
pub async fn predict_with_grid(
    source: &dyn RaceDataSource,
    predictor: Option<&WinPredictor>,
    rows: &[GridRow],
) -> Result<GridPrediction, ServiceError> {
    let predictor = predictor.ok_or(ServiceError::ModelUnavailable)?;
    if rows.is_empty() {
        return Err(ServiceError::MissingGrid);
    }

    let Some(race) = source.next_race().await? else {
        return Ok(GridPrediction::NoUpcomingRace);
    };

    let entry_map = resolve_entry_map(source).await?;
    if entry_map.is_empty() {
        return Ok(GridPrediction::NoRoster);
    }

    let entries = validate_grid(rows, &entry_map).map_err(ServiceError::Validation)?;
    let predictions = predict_entries(source, predictor, &race, &entries).await?;
    Ok(GridPrediction::Ready { race, predictions })
}

/// Probability for a complete, caller-built feature map
pub fn predict_features(
    predictor: Option<&WinPredictor>,
    values: &FeatureRequest,
) -> Result<f64, ServiceError> {
    let predictor = predictor.ok_or(ServiceError::ModelUnavailable)?;
    Ok(round_probability(predictor.predict_from_map(values)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::feature_names;
    use crate::data::results::ResultRecord;
    use crate::ergast::InMemorySource;
    use crate::models::{Location, StandingEntry};
    use crate::training::{GbdtModel, ModelMetadata, Node, Tree};
    use async_trait::async_trait;
    use serde_json::json;

    fn race() -> RaceMeta {
        RaceMeta {
            season: 2024,
            round: 3,
            race_name: "Australian Grand Prix".to_string(),
            date: Some("2024-03-24".to_string()),
            time: Some("04:00:00Z".to_string()),
            circuit: "Albert Park Grand Prix Circuit".to_string(),
            location: Location::default(),
        }
    }

    fn entry(driver: &str, constructor: &str, grid: u32) -> RaceEntry {
        RaceEntry {
            driver: driver.to_string(),
            constructor: constructor.to_string(),
            grid,
        }
    }

    fn standing(driver: &str, constructor: &str, position: u32) -> StandingEntry {
        StandingEntry {
            driver: driver.to_string(),
            constructor: constructor.to_string(),
            standing_position: position,
        }
    }

    fn result(round: u32, driver: &str, constructor: &str, position: u32, points: f64) -> ResultRecord {
        ResultRecord {
            season: 2024,
            round,
            race: format!("Round {}", round),
            driver: driver.to_string(),
            constructor: constructor.to_string(),
            position,
            grid: position,
            points,
            status: "Finished".to_string(),
        }
    }

    /// Higher margin for better grid and for more points
    fn predictor() -> WinPredictor {
        let split = |feature_index: usize, threshold: f64, low: f64, high: f64| Tree {
            nodes: vec![
                Node {
                    feature_index,
                    threshold,
                    left: 1,
                    right: 2,
                    value: None,
                },
                Node::leaf(low),
                Node::leaf(high),
            ],
        };

        WinPredictor::from_model(GbdtModel {
            feature_names: feature_names(),
            base_margin: -1.0,
            trees: vec![split(0, 2.5, 1.0, -1.0), split(1, 20.0, 0.0, 1.5)],
            metadata: ModelMetadata::default(),
        })
        .unwrap()
    }

    fn source() -> InMemorySource {
        let mut source = InMemorySource {
            next_race: Some(race()),
            standings: vec![
                standing("Max Verstappen", "Red Bull", 1),
                standing("Charles Leclerc", "Ferrari", 2),
                standing("Lando Norris", "McLaren", 3),
            ],
            ..InMemorySource::default()
        };
        source.results.insert(
            2024,
            vec![
                result(1, "Max Verstappen", "Red Bull", 1, 25.0),
                result(1, "Charles Leclerc", "Ferrari", 4, 12.0),
                result(2, "Max Verstappen", "Red Bull", 1, 25.0),
                result(2, "Charles Leclerc", "Ferrari", 3, 15.0),
                // Must not leak into round 3 features
                result(3, "Lando Norris", "McLaren", 1, 25.0),
            ],
        );
        source
    }

    struct Unreachable;

    #[async_trait]
    impl RaceDataSource for Unreachable {
        async fn season_results(&self, _season: i32) -> Result<Vec<ResultRecord>, ApiError> {
            Err(ApiError::Malformed("offline".to_string()))
        }
        async fn next_race(&self) -> Result<Option<RaceMeta>, ApiError> {
            Ok(Some(race()))
        }
        async fn next_qualifying(&self) -> Result<Vec<RaceEntry>, ApiError> {
            Err(ApiError::Malformed("offline".to_string()))
        }
        async fn driver_standings(&self) -> Result<Vec<StandingEntry>, ApiError> {
            Err(ApiError::Malformed("offline".to_string()))
        }
    }

    fn grid_rows(rows: Value) -> Vec<GridRow> {
        serde_json::from_value(rows).unwrap()
    }

    #[test]
    fn test_parse_grid_value() {
        assert_eq!(parse_grid_value(&json!(3)), Some(3));
        assert_eq!(parse_grid_value(&json!(0)), Some(0));
        assert_eq!(parse_grid_value(&json!(4.0)), Some(4));
        assert_eq!(parse_grid_value(&json!(" 7 ")), Some(7));
        assert_eq!(parse_grid_value(&json!(2.5)), None);
        assert_eq!(parse_grid_value(&json!(-1)), None);
        assert_eq!(parse_grid_value(&json!("pole")), None);
        assert_eq!(parse_grid_value(&json!(null)), None);
        assert_eq!(parse_grid_value(&json!(true)), None);
    }

    #[test]
    fn test_validate_grid_collects_every_error() {
        let map: EntryMap = [("Max Verstappen", "Red Bull"), ("Charles Leclerc", "Ferrari")]
            .iter()
            .map(|(d, c)| (d.to_string(), c.to_string()))
            .collect();
        let rows = grid_rows(json!([
            {"driver": "Max Verstappen", "grid": 1},
            {"driver": "Nobody", "grid": 2},
            {"driver": " Charles Leclerc ", "grid": "P3"}
        ]));

        let errors = validate_grid(&rows, &map).unwrap_err();
        assert_eq!(
            errors,
            vec![
                EntryError {
                    index: 1,
                    driver: "Nobody".to_string(),
                    issue: EntryIssue::UnknownDriver,
                },
                EntryError {
                    index: 2,
                    driver: "Charles Leclerc".to_string(),
                    issue: EntryIssue::InvalidGrid,
                },
            ]
        );
    }

    #[test]
    fn test_validate_grid_takes_constructor_from_map() {
        let map: EntryMap = [("Max Verstappen".to_string(), "Red Bull".to_string())].into();
        let rows = grid_rows(json!([{"driver": "Max Verstappen", "grid": "2", "constructor": "Ferrari"}]));

        let entries = validate_grid(&rows, &map).unwrap();
        assert_eq!(entries, vec![entry("Max Verstappen", "Red Bull", 2)]);
    }

    #[test]
    fn test_rank_predictions_is_stable() {
        let prediction = |driver: &str, p: f64| DriverPrediction {
            driver: driver.to_string(),
            constructor: "Team".to_string(),
            grid: 1,
            win_probability: p,
        };
        let ranked = rank_predictions(vec![
            prediction("A", 0.1),
            prediction("B", 0.4),
            prediction("C", 0.1),
            prediction("D", 0.4),
        ]);
        let order: Vec<&str> = ranked.iter().map(|p| p.driver.as_str()).collect();
        assert_eq!(order, vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn test_non_object_rows_are_reported_per_index() {
        let map: EntryMap = [("Max Verstappen".to_string(), "Red Bull".to_string())]
            .into_iter()
            .collect();
        let rows = grid_rows(json!([{"driver": "Max Verstappen", "grid": 1}, 5, "Lando Norris"]));
        assert_eq!(rows.len(), 3);

        let errors = validate_grid(&rows, &map).unwrap_err();
        let indexed: Vec<(usize, EntryIssue)> = errors.iter().map(|e| (e.index, e.issue)).collect();
        assert_eq!(
            indexed,
            vec![(1, EntryIssue::UnknownDriver), (2, EntryIssue::UnknownDriver)]
        );
    }

    #[tokio::test]
    async fn test_awaiting_qualifying() {
        let outcome = predict_next_race(&source(), Some(&predictor())).await.unwrap();
        assert_eq!(outcome, AutoPrediction::AwaitingQualifying(race()));
    }

    #[tokio::test]
    async fn test_no_upcoming_race() {
        let source = InMemorySource::default();
        let outcome = predict_next_race(&source, Some(&predictor())).await.unwrap();
        assert_eq!(outcome, AutoPrediction::NoUpcomingRace);

        let rows = grid_rows(json!([{"driver": "Max Verstappen", "grid": 1}]));
        let outcome = predict_with_grid(&source, Some(&predictor()), &rows).await.unwrap();
        assert_eq!(outcome, GridPrediction::NoUpcomingRace);
    }

    #[tokio::test]
    async fn test_predict_next_race_from_qualifying() {
        let mut source = source();
        source.qualifying = vec![
            entry("Lando Norris", "McLaren", 1),
            entry("Max Verstappen", "Red Bull", 2),
            entry("Charles Leclerc", "Ferrari", 3),
        ];

        let AutoPrediction::Ready { race, predictions } =
            predict_next_race(&source, Some(&predictor())).await.unwrap()
        else {
            panic!("expected predictions");
        };

        assert_eq!(race.round, 3);
        // Norris' round 3 win is not prior form; with it he would tie and lead
        let order: Vec<&str> = predictions.iter().map(|p| p.driver.as_str()).collect();
        assert_eq!(order, vec!["Max Verstappen", "Lando Norris", "Charles Leclerc"]);
        assert_eq!(predictions[0].grid, 2);
        assert_eq!(predictions[0].win_probability, 0.818);
        assert!(predictions
            .windows(2)
            .all(|w| w[0].win_probability >= w[1].win_probability));
        for p in &predictions {
            assert_eq!(p.win_probability, round_probability(p.win_probability));
        }
    }

    #[tokio::test]
    async fn test_predict_with_grid_uses_standings() {
        let rows = grid_rows(json!([
            {"driver": "Lando Norris", "grid": 1},
            {"driver": "Charles Leclerc", "grid": 2}
        ]));

        let GridPrediction::Ready { predictions, .. } =
            predict_with_grid(&source(), Some(&predictor()), &rows).await.unwrap()
        else {
            panic!("expected predictions");
        };

        let norris = predictions.iter().find(|p| p.driver == "Lando Norris").unwrap();
        assert_eq!(norris.constructor, "McLaren");
        assert_eq!(norris.grid, 1);
    }

    #[tokio::test]
    async fn test_predict_with_grid_rejects_unknown_driver() {
        let rows = grid_rows(json!([
            {"driver": "Max Verstappen", "grid": 1},
            {"driver": "Ayrton Senna", "grid": 2}
        ]));

        let err = predict_with_grid(&source(), Some(&predictor()), &rows)
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].index, 1);
                assert_eq!(errors[0].issue, EntryIssue::UnknownDriver);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_predict_with_grid_edge_cases() {
        let err = predict_with_grid(&source(), Some(&predictor()), &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingGrid));

        let rows = grid_rows(json!([{"driver": "Max Verstappen", "grid": 1}]));
        let err = predict_with_grid(&source(), None, &rows).await.unwrap_err();
        assert!(matches!(err, ServiceError::ModelUnavailable));

        let empty_roster = InMemorySource {
            next_race: Some(race()),
            ..InMemorySource::default()
        };
        let outcome = predict_with_grid(&empty_roster, Some(&predictor()), &rows).await.unwrap();
        assert_eq!(outcome, GridPrediction::NoRoster);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported() {
        let rows = grid_rows(json!([{"driver": "Max Verstappen", "grid": 1}]));
        let err = predict_with_grid(&Unreachable, Some(&predictor()), &rows)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));

        assert!(matches!(next_grid(&Unreachable).await, Err(ServiceError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_qualifying_outage_awaits_grid() {
        let outcome = predict_next_race(&Unreachable, Some(&predictor())).await.unwrap();
        assert_eq!(outcome, AutoPrediction::AwaitingQualifying(race()));
    }

    #[tokio::test]
    async fn test_qualifying_takes_precedence_over_standings() {
        let mut source = source();
        source.qualifying = vec![entry("Max Verstappen", "Red Bull Racing", 1)];

        let map = resolve_entry_map(&source).await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["Max Verstappen"], "Red Bull Racing");
    }

    #[tokio::test]
    async fn test_next_roster() {
        let roster = next_roster(&source()).await.unwrap().unwrap();
        assert_eq!(roster.race.round, 3);
        assert_eq!(roster.drivers.len(), 3);

        assert!(next_roster(&InMemorySource::default()).await.unwrap().is_none());
    }

    #[test]
    fn test_predict_features() {
        let predictor = predictor();
        let mut values: FeatureRequest = feature_names().into_iter().map(|n| (n, 0.0)).collect();

        let p = predict_features(Some(&predictor), &values).unwrap();
        assert!(p > 0.0 && p < 1.0);

        values.remove("grid");
        let err = predict_features(Some(&predictor), &values).unwrap_err();
        assert!(matches!(err, ServiceError::Model(ModelError::FeatureKeys { .. })));

        assert!(matches!(
            predict_features(None, &values),
            Err(ServiceError::ModelUnavailable)
        ));
    }
}
