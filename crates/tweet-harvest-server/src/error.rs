//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tweet_harvest::HarvestError;

/// Status used when the client went away before the harvest finished.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// All errors a request handler can return.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Harvest(#[from] HarvestError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Harvest(e) => match e {
                HarvestError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
                HarvestError::UnsupportedPlatform(_) | HarvestError::SessionAcquisition(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                HarvestError::Navigation { .. }
                | HarvestError::Driver(_)
                | HarvestError::NoRecordExtracted { .. } => StatusCode::BAD_GATEWAY,
                HarvestError::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Harvest(e) => match e {
                HarvestError::InvalidQuery(_) => "E_INVALID_QUERY",
                HarvestError::UnsupportedPlatform(_) => "E_UNSUPPORTED_PLATFORM",
                HarvestError::SessionAcquisition(_) => "E_SESSION_ACQUISITION",
                HarvestError::Navigation { .. } => "E_NAVIGATION",
                HarvestError::Driver(_) => "E_DRIVER",
                HarvestError::NoRecordExtracted { .. } => "E_NO_RECORD_EXTRACTED",
                HarvestError::Cancelled => "E_CANCELLED",
            },
            ApiError::Internal(_) => "E_INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{self}");
        } else {
            tracing::debug!(code = self.code(), "{self}");
        }
        let body = serde_json::json!({
            "error": { "code": self.code(), "message": self.to_string() }
        });
        (status, Json(body)).into_response()
    }
}
