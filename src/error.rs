use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// AuthError
///
/// Outcome of a rejected credential check. A request without a token is
/// answered with 403, a request with a bad or expired token with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no access token provided")]
    MissingCredential,
    #[error("access token is invalid or expired")]
    InvalidCredential,
}

/// Error
///
/// The crate-wide failure taxonomy. Every core operation returns one of these
/// and handlers hand it straight back to axum, which renders it via
/// `IntoResponse`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid role: {0:?}")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Detail is for the server log only.
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

/// StoreError
///
/// What a storage collaborator may report. Anything that is not a uniqueness
/// conflict is an opaque backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Error::Conflict(msg),
            StoreError::Backend(msg) => Error::Internal(msg),
        }
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidRole(_) => StatusCode::BAD_REQUEST,
            Error::Auth(AuthError::MissingCredential) => StatusCode::FORBIDDEN,
            Error::Auth(AuthError::InvalidCredential) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRole(_) => "invalid_role",
            Error::Auth(AuthError::MissingCredential) => "missing_credential",
            Error::Auth(AuthError::InvalidCredential) => "invalid_credential",
            Error::Forbidden(_) => "forbidden",
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        Error::Auth(self).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            Error::Internal(detail) => {
                tracing::error!(error = %detail, "internal failure while handling request");
                json!({ "error": code, "message": "internal server error" })
            }
            Error::Validation(errors) => json!({
                "error": code,
                "message": "validation failed",
                "details": errors,
            }),
            other => json!({ "error": code, "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
