use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Acquisition cancelled by the user")]
    AcquisitionCancelled,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to resolve content handle: {0}")]
    Resolve(String),

    #[error("No pending prompt with id {0}")]
    UnknownPrompt(u64),

    #[error("No cycle with id {0}")]
    UnknownCycle(u64),

    #[error("Reply does not match prompt {id}: expected {expected}")]
    PromptMismatch { id: u64, expected: &'static str },

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ShellError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ShellError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            ShellError::AcquisitionCancelled => (StatusCode::CONFLICT, "ACQUISITION_CANCELLED"),
            ShellError::Decode(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_ERROR"),
            ShellError::Resolve(_) => (StatusCode::NOT_FOUND, "RESOLVE_ERROR"),
            ShellError::UnknownPrompt(_) => (StatusCode::NOT_FOUND, "UNKNOWN_PROMPT"),
            ShellError::UnknownCycle(_) => (StatusCode::NOT_FOUND, "UNKNOWN_CYCLE"),
            ShellError::PromptMismatch { .. } => (StatusCode::BAD_REQUEST, "PROMPT_MISMATCH"),
            ShellError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            ShellError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ShellError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
