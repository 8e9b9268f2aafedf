//! Error taxonomy for the refund endpoint.
//!
//! Business-rule failures carry a human-readable message that is returned
//! as-is. Collaborator failures are logged with their full detail and
//! surfaced to callers only as a stable error code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::payments::PaymentError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RefundError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RefundError {
    pub fn status(&self) -> StatusCode {
        match self {
            RefundError::NotFound(_) => StatusCode::NOT_FOUND,
            RefundError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RefundError::Forbidden(_) => StatusCode::FORBIDDEN,
            RefundError::Conflict(_) => StatusCode::CONFLICT,
            RefundError::Payment(_) | RefundError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code returned to callers for internal failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            RefundError::Payment(_) => Some("payment_provider_error"),
            RefundError::Store(_) => Some("store_error"),
            _ => None,
        }
    }
}

/// Body shared by every `/refund-booking` response.
#[derive(Debug, Serialize)]
pub struct RefundResponseBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl IntoResponse for RefundError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            RefundError::NotFound(msg)
            | RefundError::BadRequest(msg)
            | RefundError::Forbidden(msg)
            | RefundError::Conflict(msg) => msg.clone(),
            RefundError::Payment(e) => {
                tracing::error!(error = %e, "Refund failed at payment provider");
                "Refund failed".to_string()
            }
            RefundError::Store(e) => {
                tracing::error!(error = %e, "Refund failed at document store");
                "Refund failed".to_string()
            }
        };

        let body = RefundResponseBody {
            success: false,
            message,
            error: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
