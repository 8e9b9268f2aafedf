//! Saga, audit and notification models plus HTTP request/response bodies.
//!
//! The booking shapes themselves live in [`crate::booking`]; this module
//! holds the records the refund saga writes and the wire types the routes
//! speak. JSON field names are camelCase to match the mobile clients.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{BookingSource, RefundPlan, UnknownValue};

// ============================================================================
// Refund saga
// ============================================================================

/// Position of a refund saga. Steps run strictly in declaration order;
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    ReversePayment,
    UpdateBooking,
    UpdateMirror,
    RecordAudit,
    Notify,
    Completed,
    Failed,
}

impl SagaStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::ReversePayment => "reverse_payment",
            SagaStep::UpdateBooking => "update_booking",
            SagaStep::UpdateMirror => "update_mirror",
            SagaStep::RecordAudit => "record_audit",
            SagaStep::Notify => "notify",
            SagaStep::Completed => "completed",
            SagaStep::Failed => "failed",
        }
    }

    /// The step that follows a successful `self`.
    pub fn next(&self) -> SagaStep {
        match self {
            SagaStep::ReversePayment => SagaStep::UpdateBooking,
            SagaStep::UpdateBooking => SagaStep::UpdateMirror,
            SagaStep::UpdateMirror => SagaStep::RecordAudit,
            SagaStep::RecordAudit => SagaStep::Notify,
            SagaStep::Notify => SagaStep::Completed,
            SagaStep::Completed => SagaStep::Completed,
            SagaStep::Failed => SagaStep::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStep::Completed | SagaStep::Failed)
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SagaStep {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reverse_payment" => Ok(SagaStep::ReversePayment),
            "update_booking" => Ok(SagaStep::UpdateBooking),
            "update_mirror" => Ok(SagaStep::UpdateMirror),
            "record_audit" => Ok(SagaStep::RecordAudit),
            "notify" => Ok(SagaStep::Notify),
            "completed" => Ok(SagaStep::Completed),
            "failed" => Ok(SagaStep::Failed),
            other => Err(UnknownValue::new("saga step", other)),
        }
    }
}

/// Durable progress marker for one `(booking_id, user_id)` refund.
///
/// Written before the payment call so a crash between the reversal and the
/// booking writes leaves a record the recovery worker can finish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSaga {
    pub id: Uuid,
    pub booking_id: String,
    pub user_id: String,
    pub source: BookingSource,
    pub payment_intent: String,
    pub persons: i32,
    pub item_id: Option<String>,
    pub next_step: SagaStep,
    pub provider_refund_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefundSaga {
    pub fn from_plan(plan: &RefundPlan, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: plan.booking_id.clone(),
            user_id: plan.user_id.clone(),
            source: plan.source,
            payment_intent: plan.payment_intent.clone(),
            persons: plan.persons,
            item_id: plan.item_id.clone(),
            next_step: SagaStep::ReversePayment,
            provider_refund_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key sent with the reversal so a replay cannot refund twice.
    pub fn idempotency_key(&self) -> String {
        format!("booking-refund-{}", self.id)
    }
}

/// Outcome of trying to start a saga for a `(booking_id, user_id)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SagaClaim {
    Claimed(RefundSaga),
    /// Another saga already owns the pair and has not failed.
    Existing(RefundSaga),
}

// ============================================================================
// Audit and notification records
// ============================================================================

/// Append-only audit entry written once per completed reversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRecord {
    /// Same as the saga id; makes replays of the audit step a no-op.
    pub id: Uuid,
    pub booking_id: String,
    pub user_id: String,
    pub source: BookingSource,
    /// Payment reference the reversal was issued against.
    pub refund_id: String,
    pub provider_refund_id: Option<String>,
    pub persons: i32,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl RefundRecord {
    pub const STATUS_REFUNDED: &'static str = "refunded";

    pub fn from_saga(saga: &RefundSaga, now: DateTime<Utc>) -> Self {
        Self {
            id: saga.id,
            booking_id: saga.booking_id.clone(),
            user_id: saga.user_id.clone(),
            source: saga.source,
            refund_id: saga.payment_intent.clone(),
            provider_refund_id: saga.provider_refund_id.clone(),
            persons: saga.persons,
            status: Self::STATUS_REFUNDED.to_string(),
            timestamp: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Cancel,
    Refund,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 2] = [NotificationKind::Cancel, NotificationKind::Refund];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Cancel => "cancel",
            NotificationKind::Refund => "refund",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::Cancel => "Booking Cancelled",
            NotificationKind::Refund => "Refund Processed",
        }
    }

    pub fn message(&self, item_title: &str) -> String {
        match self {
            NotificationKind::Cancel => {
                format!("Your booking for {} has been cancelled.", item_title)
            }
            NotificationKind::Refund => {
                format!("Your refund for {} has been processed.", item_title)
            }
        }
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancel" => Ok(NotificationKind::Cancel),
            "refund" => Ok(NotificationKind::Refund),
            other => Err(UnknownValue::new("notification type", other)),
        }
    }
}

/// Durable per-user notification, independent of push delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub saga_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub source: BookingSource,
    pub item_id: Option<String>,
    pub booking_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl Notification {
    pub fn for_saga(
        saga: &RefundSaga,
        kind: NotificationKind,
        item_title: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            saga_id: saga.id,
            user_id: saga.user_id.clone(),
            title: kind.title().to_string(),
            message: kind.message(item_title),
            kind,
            source: saga.source,
            item_id: saga.item_id.clone(),
            booking_id: saga.booking_id.clone(),
            timestamp: now,
            is_read: false,
        }
    }
}

// ============================================================================
// Request Models (Deserialize from JSON input)
// ============================================================================

/// Body of `POST /refund-booking`. Fields are optional so a missing one
/// produces the endpoint's own 400 body instead of an extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBookingRequest {
    pub booking_id: Option<String>,
    pub user_id: Option<String>,
}

/// Body of `POST /create-payment-intent`; amount in minor currency units.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub amount: Option<i64>,
}

// ============================================================================
// Response Models
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentErrorResponse {
    pub error: String,
}

/// Generic list wrapper for the read endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_advance_in_order_and_stop_at_terminal() {
        let mut step = SagaStep::ReversePayment;
        let mut seen = vec![step];
        while !step.is_terminal() {
            step = step.next();
            seen.push(step);
        }
        assert_eq!(
            seen,
            vec![
                SagaStep::ReversePayment,
                SagaStep::UpdateBooking,
                SagaStep::UpdateMirror,
                SagaStep::RecordAudit,
                SagaStep::Notify,
                SagaStep::Completed,
            ]
        );
        assert_eq!(SagaStep::Failed.next(), SagaStep::Failed);
    }

    #[test]
    fn step_names_round_trip_through_storage_form() {
        for step in [SagaStep::UpdateMirror, SagaStep::Failed] {
            assert_eq!(step.as_str().parse::<SagaStep>().unwrap(), step);
        }
        assert!("paused".parse::<SagaStep>().is_err());
    }

    #[test]
    fn notification_carries_saga_context() {
        let plan = RefundPlan {
            booking_id: "B1".into(),
            user_id: "U1".into(),
            source: BookingSource::Tour,
            payment_intent: "pi_1".into(),
            persons: 2,
            item_id: Some("T1".into()),
        };
        let saga = RefundSaga::from_plan(&plan, Utc::now());
        let note = Notification::for_saga(&saga, NotificationKind::Refund, "Lake Tour", Utc::now());

        assert_eq!(note.kind, NotificationKind::Refund);
        assert_eq!(note.message, "Your refund for Lake Tour has been processed.");
        assert_eq!(note.item_id.as_deref(), Some("T1"));
        assert!(!note.is_read);

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["type"], "refund");
        assert_eq!(json["bookingId"], "B1");
    }
}
