//! Application error type shared by the HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::probe::ResolutionError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        AppError::BadRequest(msg.to_string())
    }

    pub fn unavailable(msg: &str) -> Self {
        AppError::Unavailable(msg.to_string())
    }

    /// Machine-readable code and HTTP status for this error
    pub fn code(&self) -> (&'static str, StatusCode) {
        match self {
            AppError::NotFound(_) => ("NOT_FOUND", StatusCode::NOT_FOUND),
            AppError::BadRequest(_) => ("BAD_REQUEST", StatusCode::BAD_REQUEST),
            AppError::Unavailable(_) => ("CLUSTER_UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE),
            AppError::Kubernetes(_) => ("KUBERNETES_ERROR", StatusCode::BAD_GATEWAY),
        }
    }
}

impl From<ResolutionError> for AppError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::PodNotFound { .. } | ResolutionError::ServiceNotFound { .. } => {
                AppError::NotFound(err.to_string())
            }
            ResolutionError::NoPodIp { .. }
            | ResolutionError::EmptyTarget
            | ResolutionError::InvalidTarget(_)
            | ResolutionError::SourceNotPod(_) => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, status) = self.code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }
        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
