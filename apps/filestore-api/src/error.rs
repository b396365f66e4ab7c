//! Error types for the file store API
//!
//! Every error renders as `{"status":"error","message":...}` with a fixed
//! message. The underlying cause is logged and never sent to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use filestore_core::{IdentityError, StoreError};
use pdfstamp_core::{JobError, StampError};
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Could not parse multipart form: {0}")]
    FormParse(String),

    #[error("Missing file part")]
    MissingFile,

    #[error("File exceeds {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] IdentityError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported hash type: {0}")]
    UnsupportedHash(String),

    #[error(transparent)]
    Params(#[from] JobError),

    #[error("Stamping failed: {0}")]
    Merge(StampError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::FormParse(_)
            | ApiError::MissingFile
            | ApiError::InvalidName(_)
            | ApiError::UnsupportedHash(_)
            | ApiError::Params(_) => StatusCode::BAD_REQUEST,
            ApiError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Merge(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client
    pub fn message(&self) -> String {
        match self {
            ApiError::FormParse(_) => "Could not parse multipart form".to_string(),
            ApiError::MissingFile | ApiError::InvalidName(_) => "Invalid file".to_string(),
            ApiError::FileTooLarge { .. } => "File too big".to_string(),
            ApiError::UnsupportedType(_) => "Invalid file type".to_string(),
            ApiError::InvalidToken(_) => "Invalid token".to_string(),
            ApiError::NotFound(_) => "File not found".to_string(),
            ApiError::UnsupportedHash(_) => "Unsupported hash type".to_string(),
            ApiError::Params(e) => e.to_string(),
            ApiError::Merge(_) => "Merge error".to_string(),
            ApiError::Storage(_) => "Can not write file".to_string(),
            ApiError::Internal(_) => "Internal error".to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FileTooLarge { limit, .. } => ApiError::FileTooLarge { limit },
            StoreError::UnsupportedType(mime) => ApiError::UnsupportedType(mime),
            StoreError::InvalidName(name) => ApiError::InvalidName(name),
            StoreError::NotFound(name) => ApiError::NotFound(name),
            StoreError::UnsupportedAlgorithm(name) => ApiError::UnsupportedHash(name),
            StoreError::Identity(e) => ApiError::InvalidToken(e),
            StoreError::Io(e) => ApiError::Storage(e),
        }
    }
}

impl From<StampError> for ApiError {
    fn from(err: StampError) -> Self {
        match err {
            StampError::Store(e) => e.into(),
            other => ApiError::Merge(other),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() || matches!(self, ApiError::Merge(_)) {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        let body = ErrorResponse {
            status: "error",
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
