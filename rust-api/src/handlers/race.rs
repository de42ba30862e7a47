use actix_web::{web, HttpResponse};
use std::sync::Arc;

use super::{no_upcoming_race, AppState};
use crate::error::AppError;
use crate::models::GridResponse;
use crate::service;

/// Metadata of the next scheduled race
pub async fn next_race(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    match service::next_race(state.source.as_ref()).await? {
        Some(race) => Ok(HttpResponse::Ok().json(race)),
        None => Ok(HttpResponse::Ok().json(no_upcoming_race())),
    }
}

/// Qualifying order of the next race
pub async fn next_grid(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    let grid = service::next_grid(state.source.as_ref()).await?;
    Ok(HttpResponse::Ok().json(GridResponse { grid }))
}

/// Next race plus the current driver standings
pub async fn next_roster(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    match service::next_roster(state.source.as_ref()).await? {
        Some(roster) => Ok(HttpResponse::Ok().json(roster)),
        None => Ok(HttpResponse::Ok().json(no_upcoming_race())),
    }
}
