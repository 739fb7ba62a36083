use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::llm::LlmError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("itinerary generation unavailable: {0}")]
    GenerationUnavailable(#[from] LlmError),
    #[error("refinement rejected: {0}")]
    RefinementRejected(String),
    #[error("itinerary advanced past version {expected}; reload and retry")]
    ConcurrencyConflict { expected: i64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("not found")]
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::GenerationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RefinementRejected(_) | AppError::ConcurrencyConflict { .. } => {
                StatusCode::CONFLICT
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
