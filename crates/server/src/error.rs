//! Application error types.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::counter::CounterError;
use crate::query::QueryError;
use crate::search::SearchError;

/// Application errors, rendered as `{ success: false, message, extensions: { code } }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    NonExist(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Overflow(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Database Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Machine-readable code carried in `extensions.code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadInput(_) => "BAD_INPUT",
            AppError::NonExist(_) => "NON_EXIST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Duplicate(_) => "DUPLICATE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Overflow(_) => "OVERFLOW",
            AppError::Unavailable(_) => "UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadInput(_) => StatusCode::BAD_REQUEST,
            AppError::NonExist(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Duplicate(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Overflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Internal details are logged, never returned.
        if let AppError::Internal(e) = &self {
            tracing::error!(error = ?e, "internal server error");
        }

        let body = json!({
            "success": false,
            "message": self.to_string(),
            "extensions": { "code": self.code() },
        });

        (self.status(), Json(body)).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::BadInput(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Unavailable(_) => AppError::Unavailable(err.to_string()),
            SearchError::InvalidLimit(_) | SearchError::InvalidDate(_) => {
                AppError::BadInput(err.to_string())
            }
            SearchError::Query(e) => e.into(),
        }
    }
}

impl From<CounterError> for AppError {
    fn from(err: CounterError) -> Self {
        match err {
            CounterError::NotFound(_) => AppError::NonExist(err.to_string()),
            CounterError::OutsideWorkspace(_) => {
                AppError::Unauthorized("This Counter is outside the current Workspace".to_string())
            }
            CounterError::Duplicate { .. } => AppError::Duplicate(err.to_string()),
            CounterError::Conflict(_) => AppError::Conflict(err.to_string()),
            CounterError::Overflow(_) => AppError::Overflow(err.to_string()),
            CounterError::InvalidFormat(_)
            | CounterError::InvalidIncrement(_)
            | CounterError::InvalidCount { .. }
            | CounterError::MissingField(_) => AppError::BadInput(err.to_string()),
            CounterError::Store(e) => AppError::Internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadInput(rejection.body_text())
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
