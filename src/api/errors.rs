//! API Error Handling
//!
//! Every rejection carries the request id and a stable code. Internal faults
//! are logged in full and surfaced with a generic message.

use super::middleware::RequestId;
use crate::errors::WagerError;
use crate::ledger::types::units_from_cents;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// INVALID_INPUT, INSUFFICIENT_FUNDS, ROUND_CLOSED, ...
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: WagerError,
    pub request_id: String,
}

impl ApiError {
    pub fn new(request_id: &RequestId, kind: WagerError) -> Self {
        Self {
            kind,
            request_id: request_id.0.clone(),
        }
    }

    pub fn bad_request(request_id: &RequestId, message: impl Into<String>) -> Self {
        Self::new(request_id, WagerError::InvalidInput(message.into()))
    }

    pub fn unauthorized(request_id: &RequestId, message: impl Into<String>) -> Self {
        Self::new(request_id, WagerError::Unauthorized(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.kind {
            WagerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            WagerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WagerError::UnknownGame(_) | WagerError::NotFound(_) => StatusCode::NOT_FOUND,
            WagerError::GameInactive(_) | WagerError::RoundClosed | WagerError::NoActiveBet => {
                StatusCode::CONFLICT
            }
            WagerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WagerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.request_id, self.kind)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match &self.kind {
            WagerError::Internal(detail) => {
                error!(request_id = %self.request_id, detail = %detail, "internal fault");
                ("internal server error".to_string(), None)
            }
            WagerError::InsufficientFunds { requested, available } => (
                self.kind.to_string(),
                Some(serde_json::json!({
                    "requested": units_from_cents(*requested),
                    "available": units_from_cents(*available),
                })),
            ),
            other => (other.to_string(), None),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: self.kind.code().to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = ApiError::new(
            &RequestId("req-1".to_string()),
            WagerError::Internal("rocksdb: IO error at /var/lib".to_string()),
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_mapping() {
        let rid = RequestId("r".to_string());
        assert_eq!(ApiError::new(&rid, WagerError::RoundClosed).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::new(&rid, WagerError::UnknownGame("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::unauthorized(&rid, "no").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::bad_request(&rid, "no").status(), StatusCode::BAD_REQUEST);
    }
}
