use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{accounts::services::ServiceError, response::Envelope};

/// Error kinds exposed over HTTP. Everything renders as the error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("phone already registered")]
    DuplicatePhone,
    #[error("{0}")]
    NotFound(&'static str),
    /// The wrapped detail is logged, never sent.
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::DuplicateEmail | Self::DuplicatePhone => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Unauthorized(_) => "unauthorized",
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicatePhone => "duplicate_phone",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(msg) => Self::InvalidInput(msg),
            ServiceError::Unauthorized => Self::Unauthorized("invalid email or password"),
            ServiceError::DuplicateEmail => Self::DuplicateEmail,
            ServiceError::DuplicatePhone => Self::DuplicatePhone,
            ServiceError::NotFound => Self::NotFound("account not found"),
            other @ (ServiceError::DeadlineExceeded(_)
            | ServiceError::Hashing(_)
            | ServiceError::Store(_)) => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        warn!(error = %rejection.body_text(), "unparsable path parameter");
        Self::NotFound("account not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(detail) = &self {
            error!(error = %detail, "request failed");
        }
        let body = Envelope::error(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
