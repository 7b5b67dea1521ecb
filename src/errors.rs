use crate::models::ErrorBody;
use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use thiserror::Error;

/// Failure talking to the persistence service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base URL '{0}': expected http:// or https://")]
    InvalidBaseUrl(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Request(err) => err.status().map(|status| status.as_u16()),
            ApiError::InvalidBaseUrl(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("record has an invalid date '{date}'")]
    InvalidRecord { date: String },

    #[error("{0}")]
    ValidationFailed(String),

    #[error("an entry for {0} already exists, edit the existing entry instead")]
    DuplicateDate(String),

    #[error("no entry with id '{0}'")]
    NotFound(String),

    #[error("{0} is still being saved")]
    AlreadySubmitting(String),

    #[error("failed to save changes: {0}")]
    RemoteFailed(#[source] ApiError),

    #[error("failed to fetch traffic stats, please try again: {0}")]
    LoadFailed(#[source] ApiError),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }

    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

// Undecodable bodies (negative visits, missing fields) get the same JSON error
// shape as every other rejection, always as 400.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<StatsError> for AppError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::ValidationFailed(_) => Self::bad_request(err.to_string()),
            StatsError::DuplicateDate(_) | StatsError::AlreadySubmitting(_) => {
                Self::conflict(err.to_string())
            }
            StatsError::NotFound(_) => Self::not_found(err.to_string()),
            StatsError::InvalidRecord { .. } => Self::internal(err),
            StatsError::RemoteFailed(_) | StatsError::LoadFailed(_) => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "request failed");
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
