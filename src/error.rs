//! Error types for inference and the HTTP surface

use crate::validation::ValidationErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised while scoring a feature vector
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("ONNX Runtime error: {0}")]
    Runtime(String),

    #[error("Unexpected model output: {0}")]
    MalformedOutput(String),

    #[error("Probability out of range: {0}")]
    InvalidProbability(f64),

    #[error("Label out of range: {0}")]
    InvalidLabel(u8),

    #[error("Inference task failed: {0}")]
    TaskFailed(String),
}

/// Errors returned by HTTP handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::Validation(errors) => (status, Json(errors)).into_response(),
            // Cause is logged by the handler; never echoed to the caller.
            ApiError::Inference(_) => {
                (status, Json(json!({ "detail": "Internal Server Error" }))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let validation = ApiError::from(ValidationErrors { detail: Vec::new() });
        assert_eq!(validation.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let inference = ApiError::from(InferenceError::TaskFailed("worker panicked".into()));
        assert_eq!(inference.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_inference_error_hides_cause() {
        let response =
            ApiError::from(InferenceError::Runtime("secret path /opt/model".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
