//! HTTP error responses

use crate::pipeline::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image provided")]
    NoImage,

    #[error("Empty image data")]
    EmptyImage,

    #[error("Image too large")]
    PayloadTooLarge(String),

    #[error("Processing failed")]
    Processing(#[from] PipelineError),

    #[error("No medicines detected")]
    NoDetections,

    #[error("Server error")]
    Server(String),
}

impl ApiError {
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoImage | ApiError::EmptyImage => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NoDetections => StatusCode::NOT_FOUND,
            ApiError::Processing(_) | ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::NoImage => "Request must include an image file".to_string(),
            ApiError::EmptyImage => "The provided image file is empty".to_string(),
            ApiError::PayloadTooLarge(msg) => msg.clone(),
            ApiError::Processing(err) => err.to_string(),
            ApiError::NoDetections => {
                "The model did not detect any medicines in the image".to_string()
            }
            ApiError::Server(msg) => msg.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            detail: self.detail(),
        };

        if status.is_server_error() {
            tracing::error!("{}: {}", body.error, body.detail);
        } else {
            tracing::info!("{}: {}", body.error, body.detail);
        }

        (status, Json(body)).into_response()
    }
}
