use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::info;

use super::{no_upcoming_race, AppState};
use crate::error::AppError;
use crate::models::{
    FeaturePredictionResponse, FeatureRequest, GridRequest, NoDataResponse, PredictionResponse,
};
use crate::service::{self, AutoPrediction, GridPrediction, AWAITING_QUALIFYING_MESSAGE};

/// Predict the next race from its qualifying order
pub async fn predict_next_race(
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, AppError> {
    let outcome =
        service::predict_next_race(state.source.as_ref(), state.predictor.as_ref()).await?;

    let response = match outcome {
        AutoPrediction::NoUpcomingRace => return Ok(HttpResponse::Ok().json(no_upcoming_race())),
        AutoPrediction::AwaitingQualifying(race) => PredictionResponse {
            race,
            message: Some(AWAITING_QUALIFYING_MESSAGE.to_string()),
            predictions: Vec::new(),
        },
        AutoPrediction::Ready { race, predictions } => {
            info!("Predicted {} entries for {}", predictions.len(), race.race_name);
            PredictionResponse {
                race,
                message: None,
                predictions,
            }
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Predict the next race from a caller-supplied grid
pub async fn predict_with_grid(
    state: web::Data<Arc<AppState>>,
    req: Option<web::Json<GridRequest>>,
) -> Result<HttpResponse, AppError> {
    let rows = req.map(|r| r.into_inner().grid).unwrap_or_default();

    let outcome =
        service::predict_with_grid(state.source.as_ref(), state.predictor.as_ref(), &rows).await?;

    match outcome {
        GridPrediction::NoUpcomingRace => Ok(HttpResponse::Ok().json(no_upcoming_race())),
        GridPrediction::NoRoster => Ok(HttpResponse::Ok().json(NoDataResponse {
            error: "no_roster".to_string(),
            message: "Could not fetch roster; try again later".to_string(),
        })),
        GridPrediction::Ready { race, predictions } => {
            Ok(HttpResponse::Ok().json(PredictionResponse {
                race,
                message: None,
                predictions,
            }))
        }
    }
}

/// Win probability for one complete feature map
pub async fn predict_features(
    state: web::Data<Arc<AppState>>,
    req: web::Json<FeatureRequest>,
) -> Result<HttpResponse, AppError> {
    let win_probability = service::predict_features(state.predictor.as_ref(), &req)?;
    Ok(HttpResponse::Ok().json(FeaturePredictionResponse { win_probability }))
}
