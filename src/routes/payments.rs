//! Payment intent routes.
//!
//! POST /create-payment-intent - Create a charge intent and return its client secret

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use tracing::{error, info};

use crate::models::{CreatePaymentIntentRequest, PaymentErrorResponse, PaymentIntentResponse};
use crate::AppState;

type PaymentResult<T> = Result<T, (StatusCode, Json<PaymentErrorResponse>)>;

pub fn router() -> Router {
    Router::new().route("/create-payment-intent", post(create_payment_intent))
}

fn reject(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<PaymentErrorResponse>) {
    (
        status,
        Json(PaymentErrorResponse {
            error: message.into(),
        }),
    )
}

/// Create a payment intent for `amount` minor units in the configured currency.
async fn create_payment_intent(
    Extension(state): Extension<AppState>,
    payload: Result<Json<CreatePaymentIntentRequest>, JsonRejection>,
) -> PaymentResult<Json<PaymentIntentResponse>> {
    let Json(req) = payload.map_err(|e| reject(StatusCode::BAD_REQUEST, e.body_text()))?;

    let amount = match req.amount {
        Some(amount) if amount > 0 => amount,
        _ => {
            return Err(reject(
                StatusCode::BAD_REQUEST,
                "amount must be a positive integer",
            ))
        }
    };

    let intent = state
        .payments
        .create_payment_intent(amount, &state.currency)
        .await
        .map_err(|e| {
            error!(amount = amount, error = %e, "Failed to create payment intent");
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to create payment intent",
            )
        })?;

    info!(intent_id = %intent.id, amount = amount, "Payment intent created");

    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
    }))
}
