use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use crate::service::ConfigError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid date format: {0}")]
    DateTimeParseError(String),
}

impl ApiError {
    /// Stable label clients can switch on
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::NotFound(_) => "RemoteConfigNotFound",
            ApiError::Conflict(_) => "DuplicateKeyError",
            ApiError::StoreError(_) => "DatabaseError",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::DateTimeParseError(_) => "DateTimeParseError",
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ConfigError::DuplicateIdentity { .. } => ApiError::Conflict(err.to_string()),
            ConfigError::TimestampParse(_) => ApiError::DateTimeParseError(err.to_string()),
            ConfigError::ReservedVersion | ConfigError::Validation(_) => {
                ApiError::ValidationError(err.to_string())
            }
            ConfigError::Store(e) => ApiError::StoreError(e),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
    details: Option<String>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            ApiError::BadRequest(_) => actix_web::http::StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => actix_web::http::StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => actix_web::http::StatusCode::CONFLICT,
            ApiError::StoreError(_) => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => actix_web::http::StatusCode::BAD_REQUEST,
            ApiError::DateTimeParseError(_) => actix_web::http::StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let details = match self {
            // Don't leak store internals to clients
            ApiError::StoreError(e) => {
                tracing::error!(error = %e, "Store failure while serving request");
                Some("Database Access Error".to_string())
            }
            _ => Some(self.to_string()),
        };

        let error_response = ErrorResponse {
            error: self.kind().to_string(),
            code: status.as_u16(),
            details,
        };

        HttpResponse::build(status).json(error_response)
    }
}
