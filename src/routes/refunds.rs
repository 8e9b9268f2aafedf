//! Booking refund routes.
//!
//! POST /refund-booking             - Refund one user's share of a booking
//! GET  /bookings/{id}/refunds      - Audit records for a booking
//! GET  /users/{id}/notifications   - A user's notification feed

use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use tracing::info;

use crate::error::{RefundError, RefundResponseBody};
use crate::models::{ApiResponse, Notification, RefundBookingRequest, RefundRecord};
use crate::AppState;

pub fn router() -> Router {
    Router::new()
        .route("/refund-booking", post(refund_booking))
        .route("/bookings/{id}/refunds", get(list_refunds))
        .route("/users/{id}/notifications", get(list_notifications))
}

fn required(value: Option<String>, field: &str) -> Result<String, RefundError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RefundError::BadRequest(format!("{} is required", field)))
}

/// Run the refund saga for `{ bookingId, userId }`.
async fn refund_booking(
    Extension(state): Extension<AppState>,
    payload: Result<Json<RefundBookingRequest>, JsonRejection>,
) -> Result<Json<RefundResponseBody>, RefundError> {
    let Json(req) = payload.map_err(|e| RefundError::BadRequest(e.body_text()))?;
    let booking_id = required(req.booking_id, "bookingId")?;
    let user_id = required(req.user_id, "userId")?;

    let outcome = state.workflow.refund_booking(&booking_id, &user_id).await?;

    info!(
        booking_id = %booking_id,
        user_id = %user_id,
        saga_id = %outcome.saga_id,
        "Refund completed"
    );

    Ok(Json(RefundResponseBody {
        success: true,
        message: outcome.message(),
        error: None,
    }))
}

async fn list_refunds(
    Extension(state): Extension<AppState>,
    Path(booking_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<RefundRecord>>>, RefundError> {
    let refunds = state.workflow.store().list_refunds(&booking_id).await?;
    Ok(Json(ApiResponse {
        data: refunds,
        message: "Refunds retrieved".to_string(),
    }))
}

async fn list_notifications(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, RefundError> {
    let notifications = state.workflow.store().list_notifications(&user_id).await?;
    Ok(Json(ApiResponse {
        data: notifications,
        message: "Notifications retrieved".to_string(),
    }))
}
