//! HTTP handlers under `/api`

pub mod health;
pub mod predict;
pub mod race;

use actix_web::web;
use std::sync::Arc;

use crate::data::features::feature_names;
use crate::ergast::RaceDataSource;
use crate::models::NoDataResponse;
use crate::predictor::WinPredictor;

/// Application state shared across handlers
pub struct AppState {
    pub source: Arc<dyn RaceDataSource>,
    pub predictor: Option<WinPredictor>,
    pub features: Vec<String>,
}

impl AppState {
    pub fn new(source: Arc<dyn RaceDataSource>, predictor: Option<WinPredictor>) -> Self {
        let features = predictor
            .as_ref()
            .map(|p| p.feature_order().to_vec())
            .unwrap_or_else(feature_names);
        Self {
            source,
            predictor,
            features,
        }
    }
}

/// Mount every endpoint under `/api`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .route("/next-race", web::get().to(race::next_race))
            .route("/next-grid", web::get().to(race::next_grid))
            .route("/next-roster", web::get().to(race::next_roster))
            .route("/predict-next-race", web::get().to(predict::predict_next_race))
            .route(
                "/predict-next-race-with-grid",
                web::post().to(predict::predict_with_grid),
            )
            .route("/predict", web::post().to(predict::predict_features)),
    );
}

pub(crate) fn no_upcoming_race() -> NoDataResponse {
    NoDataResponse {
        error: "no_upcoming_race".to_string(),
        message: "No upcoming race found".to_string(),
    }
}
