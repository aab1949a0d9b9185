use std::fmt;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::history::HistoryError;
use crate::core::request::ValidationError;
use crate::core::tracker::TrackerError;
use crate::inference::ProviderError;

/// Body of every non-streaming error response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
}

/// Errors raised before a response is committed. Once a summarize stream
/// has started, failures travel as wire events instead.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(ValidationError),
    Provider(ProviderError),
    History(HistoryError),
    Tracker(TrackerError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "{msg}"),
            ApiError::Validation(e) => write!(f, "{e}"),
            ApiError::Provider(e) => write!(f, "{e}"),
            ApiError::History(e) => write!(f, "{e}"),
            ApiError::Tracker(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Provider(ProviderError::Config(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Provider(ProviderError::ChannelClosed) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Stream closed unexpectedly.".to_string())
            }
            ApiError::Provider(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::History(HistoryError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Entry not found.".to_string())
            }
            ApiError::History(e @ HistoryError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Tracker(e @ TrackerError::Rejected(_)) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Tracker(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            warn!("Request failed ({}): {}", status, message);
        }
        let body = ErrorBody {
            status_code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        ApiError::Provider(e)
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        ApiError::History(e)
    }
}

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        ApiError::Tracker(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
