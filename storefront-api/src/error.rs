use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::PoolError;
use serde::Serialize;
use shared::pricing::PricingError;
use shared::ParseStatusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] DieselError),

    #[error("database pool error: {0}")]
    Pool(#[from] bb8::RunError<PoolError>),

    #[error("invoice rendering failed: {0}")]
    Invoice(#[from] shared::invoice::InvoiceError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Database(DieselError::NotFound) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Database(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            ApiError::Database(err) if is_contention(err) => (StatusCode::CONFLICT, "CONFLICT"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Postgres aborted the transaction because it raced another one; the
/// client may retry.
fn is_contention(err: &DieselError) -> bool {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => true,
        DieselError::DatabaseError(DatabaseErrorKind::Unknown, info) => info.message().contains("deadlock detected"),
        _ => false,
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ParseStatusError> for ApiError {
    fn from(err: ParseStatusError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            StatusCode::NOT_FOUND if matches!(self, ApiError::Database(_)) => "Record not found".to_string(),
            StatusCode::CONFLICT => match &self {
                ApiError::Database(err) if is_contention(err) => {
                    tracing::warn!(error = %self, "request lost a race with a concurrent update");
                    "Conflicting concurrent update, please retry".to_string()
                }
                ApiError::Database(_) => "Record already exists".to_string(),
                _ => self.to_string(),
            },
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error, code })).into_response()
    }
}
