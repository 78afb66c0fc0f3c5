use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::TimeRangeError;
use crate::services::booking_builder::ValidationError;
use crate::services::lifecycle::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid time range: {0}")]
    TimeRange(#[from] TimeRangeError),

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Storage(_) => "storage",
            AppError::Validation(_) | AppError::TimeRange(_) => "validation",
            AppError::Transition(_) => "illegal_transition",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TimeRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Transition(TransitionError::ReasonTooShort { .. })
            | AppError::Transition(TransitionError::RatingOutOfRange { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Transition(TransitionError::UnknownTask(_)) => StatusCode::NOT_FOUND,
            AppError::Transition(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        (status, axum::Json(body)).into_response()
    }
}
