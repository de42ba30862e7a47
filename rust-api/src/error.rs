use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

use crate::models::{EntryError, ErrorResponse};
use crate::predictor::ModelError;
use crate::service::ServiceError;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// One or more grid rows were rejected
    ValidationFailed(Vec<EntryError>),
    /// Request body without a usable grid
    MissingGrid,
    /// Feature map keys do not match the model
    FeatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// Results API failed or returned garbage
    UpstreamUnavailable(String),
    /// No model artifacts were loaded at startup
    ModelUnavailable,
    /// Internal server error
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationFailed(errors) => {
                write!(f, "Validation failed for {} grid entries", errors.len())
            }
            AppError::MissingGrid => write!(f, "Missing grid"),
            AppError::FeatureMismatch { missing, unexpected } => write!(
                f,
                "Feature mismatch (missing: {:?}, unexpected: {:?})",
                missing, unexpected
            ),
            AppError::UpstreamUnavailable(msg) => write!(f, "Results API unavailable: {}", msg),
            AppError::ModelUnavailable => write!(f, "Model not loaded"),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Upstream(e) => AppError::UpstreamUnavailable(e.to_string()),
            ServiceError::Validation(errors) => AppError::ValidationFailed(errors),
            ServiceError::MissingGrid => AppError::MissingGrid,
            ServiceError::ModelUnavailable => AppError::ModelUnavailable,
            ServiceError::Model(ModelError::FeatureKeys { missing, unexpected }) => {
                AppError::FeatureMismatch { missing, unexpected }
            }
            ServiceError::Model(e) => AppError::InternalError(e.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::MissingGrid => StatusCode::BAD_REQUEST,
            AppError::FeatureMismatch { .. } => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        let body = match self {
            AppError::ValidationFailed(errors) => ErrorResponse {
                error: "validation_failed".to_string(),
                message,
                errors: Some(errors.clone()),
                details: None,
            },
            AppError::MissingGrid => ErrorResponse {
                error: "missing_grid".to_string(),
                message,
                errors: None,
                details: Some(json!({
                    "required_format": {"grid": [{"driver": "...", "grid": 1}]}
                })),
            },
            AppError::FeatureMismatch { missing, unexpected } => ErrorResponse {
                error: "feature_mismatch".to_string(),
                message,
                errors: None,
                details: Some(json!({"missing": missing, "unexpected": unexpected})),
            },
            AppError::UpstreamUnavailable(_) => ErrorResponse {
                error: "upstream_unavailable".to_string(),
                message,
                errors: None,
                details: None,
            },
            AppError::ModelUnavailable => ErrorResponse {
                error: "model_unavailable".to_string(),
                message,
                errors: None,
                details: None,
            },
            AppError::InternalError(_) => ErrorResponse {
                error: "internal_error".to_string(),
                message,
                errors: None,
                details: None,
            },
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
