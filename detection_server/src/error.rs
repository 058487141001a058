use crate::{camera::CameraError, store::StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use yolo_detector::DetectionError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),
    #[error("Detection timed out after {0:?}")]
    DetectionTimeout(Duration),
    #[error("Device error: {0}")]
    Device(#[from] CameraError),
    #[error("Scratch area error: {0}")]
    Scratch(#[from] std::io::Error),
    #[error("Worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("File {0} not found")]
    NotFound(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            PipelineError::Validation(reason) => {
                tracing::warn!("Rejected request: {}", reason);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        error: reason.clone(),
                        message: None,
                    },
                )
            }
            PipelineError::NotFound(id) => {
                tracing::debug!("No stored image with id {}", id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorBody {
                        error: "File not found".to_string(),
                        message: None,
                    },
                )
            }
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Internal Server Error".to_string(),
                        message: Some(other.to_string()),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
