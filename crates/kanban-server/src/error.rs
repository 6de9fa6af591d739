//! Server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kanban_hub::{AdmissionError, HubError};

use crate::response::ApiResponse;

/// Startup and runtime failures of the server itself.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or serving the listener failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The Prometheus recorder could not be installed.
    #[error("metrics recorder: {0}")]
    Metrics(String),
    /// The tracing subscriber could not be installed.
    #[error("tracing subscriber: {0}")]
    Telemetry(String),
    /// An invalid origin was configured for CORS.
    #[error("invalid client url: {0}")]
    ClientUrl(String),
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The upgrade or request was refused by the admission gate.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// The hub could not serve the request.
    #[error(transparent)]
    Hub(#[from] HubError),
}

impl ApiError {
    /// Status code sent for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Admission(AdmissionError::Directory(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Admission(e) if e.is_forbidden() => StatusCode::FORBIDDEN,
            Self::Admission(_) => StatusCode::UNAUTHORIZED,
            Self::Hub(HubError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Hub(HubError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Admission(AdmissionError::MissingToken) => {
                "Authorization token is required".to_string()
            }
            Self::Admission(AdmissionError::InvalidToken(_) | AdmissionError::Expired) => {
                "Invalid or expired token".to_string()
            }
            Self::Admission(AdmissionError::NotMember { .. }) => {
                "You are not a member of this project".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiResponse::error(message))).into_response()
    }
}
