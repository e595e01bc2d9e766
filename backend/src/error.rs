use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Fatal startup failure while loading a model artifact.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model artifact {} not found", path.display())]
    Missing { path: PathBuf },

    #[error("model artifact {} could not be loaded: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("model artifact {} does not match its column map: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },

    #[error("model '{model}': {reason}")]
    Registry { model: &'static str, reason: String },
}

/// Invalid server configuration read from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Per-request failure, rendered as a JSON error body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("field '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("invalid request body: {0}")]
    Body(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } | ApiError::Body(_) => "validation_error",
            ApiError::Inference(_) => "inference_error",
            ApiError::NotFound(_) => "not_found",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::Body(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.kind(), self.to_string()))
    }
}
