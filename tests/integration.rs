//! # Integration Tests
//!
//! These tests drive the Axum router in-process against the in-memory store,
//! a recording fake payment gateway and configurable push notifiers. No
//! external services are needed:
//!
//! ```bash
//! cargo test
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use booking_refunds::booking::{
    Booking, BookingSource, BookingStatus, HotelBooking, Participant, TourBooking,
};
use booking_refunds::handlers::refund::{RefundPolicy, RefundWorkflow, FALLBACK_TITLE};
use booking_refunds::models::{NotificationKind, SagaStep};
use booking_refunds::notify::{LogNotifier, PushData, PushError, PushNotifier};
use booking_refunds::payments::{PaymentError, PaymentGateway, PaymentIntent, ProviderRefund};
use booking_refunds::store::memory::FailPoint;
use booking_refunds::store::{MemoryRefundStore, RefundStore};
use booking_refunds::{create_app, AppState};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone)]
struct RefundCall {
    payment_intent: String,
    amount: Option<i64>,
    idempotency_key: String,
}

#[derive(Default)]
struct FakeGateway {
    calls: Mutex<Vec<RefundCall>>,
    fail_next: AtomicBool,
    /// Act on the next refund but answer with a gateway timeout.
    lose_next_reply: AtomicBool,
    delay_ms: u64,
}

impl FakeGateway {
    fn slow(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<RefundCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Distinct reversals as the provider would see them.
    fn distinct_refunds(&self) -> usize {
        let mut keys: Vec<String> = self
            .calls()
            .into_iter()
            .map(|c| c.idempotency_key)
            .collect();
        keys.sort();
        keys.dedup();
        keys.len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        assert_eq!(currency, "usd");
        Ok(PaymentIntent {
            id: "pi_test".into(),
            client_secret: format!("pi_test_secret_{}", amount),
        })
    }

    async fn refund(
        &self,
        payment_intent: &str,
        amount: Option<i64>,
        idempotency_key: &str,
    ) -> Result<ProviderRefund, PaymentError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PaymentError::Provider {
                status: 402,
                message: "charge_already_refunded".into(),
            });
        }
        self.calls.lock().unwrap().push(RefundCall {
            payment_intent: payment_intent.to_string(),
            amount,
            idempotency_key: idempotency_key.to_string(),
        });
        if self.lose_next_reply.swap(false, Ordering::SeqCst) {
            return Err(PaymentError::Provider {
                status: 504,
                message: "gateway timeout".into(),
            });
        }
        Ok(ProviderRefund {
            id: format!("re_{}", idempotency_key),
            status: Some("succeeded".into()),
        })
    }
}

/// Push notifier that counts attempts and always fails.
#[derive(Default)]
struct BrokenPush {
    attempts: AtomicUsize,
}

#[async_trait]
impl PushNotifier for BrokenPush {
    async fn send(
        &self,
        _topic: &str,
        _title: &str,
        _body: &str,
        _data: &PushData,
    ) -> Result<(), PushError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PushError::Rejected {
            status: 503,
            body: "unavailable".into(),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    app: Router,
    store: Arc<MemoryRefundStore>,
    gateway: Arc<FakeGateway>,
    workflow: Arc<RefundWorkflow>,
}

fn harness_with(
    gateway: FakeGateway,
    notifier: Arc<dyn PushNotifier>,
    policy: RefundPolicy,
) -> Harness {
    let store = Arc::new(MemoryRefundStore::new());
    let gateway = Arc::new(gateway);
    let workflow = Arc::new(RefundWorkflow::new(
        store.clone(),
        gateway.clone(),
        notifier,
        policy,
    ));
    let app = create_app(AppState {
        workflow: workflow.clone(),
        payments: gateway.clone(),
        currency: "usd".into(),
    });
    Harness {
        app,
        store,
        gateway,
        workflow,
    }
}

fn harness() -> Harness {
    harness_with(
        FakeGateway::default(),
        Arc::new(LogNotifier),
        RefundPolicy::default(),
    )
}

fn hours_ago(hours: i64) -> Option<chrono::DateTime<Utc>> {
    Some(Utc::now() - Duration::hours(hours))
}

/// Booking `B1`: U1 (2 persons, secret-form reference) and U2 (1 person).
fn tour_b1(hours: i64) -> Booking {
    Booking::Tour(TourBooking {
        id: "B1".into(),
        tour_id: Some("T1".into()),
        status: BookingStatus::Active,
        current_count: 3,
        users: vec![
            Participant {
                user_id: "U1".into(),
                payment_ref: Some("pi_1_secret_x".into()),
                persons: Some(2),
                booked_at: hours_ago(hours),
            },
            Participant {
                user_id: "U2".into(),
                payment_ref: Some("pi_2_secret_y".into()),
                persons: Some(1),
                booked_at: hours_ago(hours),
            },
        ],
    })
}

/// Hotel booking `B2` owned by `U9`.
fn hotel_b2(hours: i64) -> Booking {
    Booking::Hotel(HotelBooking {
        id: "B2".into(),
        user_id: "U9".into(),
        hotel_id: Some("H1".into()),
        payment_ref: Some("pi_9_secret_z".into()),
        total_price: Some(25_000),
        status: BookingStatus::Active,
        is_refunded: false,
        booked_at: hours_ago(hours),
    })
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn refund(app: &Router, booking_id: &str, user_id: &str) -> (StatusCode, Value) {
    post_json(
        app,
        "/refund-booking",
        json!({ "bookingId": booking_id, "userId": user_id }),
    )
    .await
}

// ============================================================================
// Refund scenarios
// ============================================================================

#[tokio::test]
async fn test_tour_refund_removes_participant() {
    let h = harness();
    h.store.insert_booking(tour_b1(1));
    h.store.insert_user_booking("U1", "B1", BookingStatus::Active);
    h.store.insert_catalog_title(BookingSource::Tour, "T1", "Sunset Canyon Tour");

    let (status, body) = refund(&h.app, "B1", "U1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "message": "Refund processed successfully for tour" })
    );

    let calls = h.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payment_intent, "pi_1");
    assert_eq!(calls[0].amount, None, "tour refunds reverse the full charge");

    let Some(Booking::Tour(tour)) = h.store.booking("B1") else {
        panic!("tour booking missing");
    };
    assert_eq!(tour.users.len(), 1);
    assert_eq!(tour.users[0].user_id, "U2");
    assert_eq!(tour.current_count, 1);
    assert_eq!(tour.status, BookingStatus::Active);
    assert_eq!(
        h.store.user_booking_status("U1", "B1"),
        Some(BookingStatus::Cancelled)
    );

    let refunds = h.store.list_refunds("B1").await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].persons, 2);
    assert_eq!(refunds[0].refund_id, "pi_1");
    assert_eq!(refunds[0].status, "refunded");
    assert_eq!(refunds[0].source, BookingSource::Tour);

    let notifications = h.store.list_notifications("U1").await.unwrap();
    assert_eq!(notifications.len(), 2);
    let kinds: Vec<NotificationKind> = notifications.iter().map(|n| n.kind).collect();
    assert!(kinds.contains(&NotificationKind::Cancel));
    assert!(kinds.contains(&NotificationKind::Refund));
    for note in &notifications {
        assert_eq!(note.booking_id, "B1");
        assert_eq!(note.item_id.as_deref(), Some("T1"));
        assert!(note.message.contains("Sunset Canyon Tour"));
    }

    let sagas = h.store.sagas();
    assert_eq!(sagas.len(), 1);
    assert_eq!(sagas[0].next_step, SagaStep::Completed);
}

#[tokio::test]
async fn test_hotel_refund_cancels_booking() {
    let h = harness();
    h.store.insert_booking(hotel_b2(2));
    h.store.insert_user_booking("U9", "B2", BookingStatus::Active);

    let (status, body) = refund(&h.app, "B2", "U9").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Refund processed successfully for hotel");

    let calls = h.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payment_intent, "pi_9");
    assert_eq!(calls[0].amount, None);

    let Some(Booking::Hotel(hotel)) = h.store.booking("B2") else {
        panic!("hotel booking missing");
    };
    assert_eq!(hotel.status, BookingStatus::Cancelled);
    assert!(hotel.is_refunded);
    assert_eq!(
        h.store.user_booking_status("U9", "B2"),
        Some(BookingStatus::Cancelled)
    );

    let refunds = h.store.list_refunds("B2").await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].persons, 1);
    assert!(refunds[0]
        .provider_refund_id
        .as_deref()
        .is_some_and(|id| id.starts_with("re_")));
}

#[tokio::test]
async fn test_expired_window_is_forbidden_without_side_effects() {
    let h = harness();
    h.store.insert_booking(hotel_b2(25));

    let (status, body) = refund(&h.app, "B2", "U9").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(h.gateway.calls().is_empty());
    assert!(h.store.sagas().is_empty());
    let Some(Booking::Hotel(hotel)) = h.store.booking("B2") else {
        panic!("hotel booking missing");
    };
    assert_eq!(hotel.status, BookingStatus::Active);
    assert!(!hotel.is_refunded);

    h.store.insert_booking(tour_b1(48));
    let (status, _) = refund(&h.app, "B1", "U1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_hotel_refund_by_other_user_is_forbidden() {
    let h = harness();
    h.store.insert_booking(hotel_b2(1));

    let (status, body) = refund(&h.app, "B2", "U1").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(h.gateway.calls().is_empty());
    assert!(h.store.list_refunds("B2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_participant_and_booking_are_not_found() {
    let h = harness();
    h.store.insert_booking(tour_b1(1));

    let (status, body) = refund(&h.app, "B1", "U404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = refund(&h.app, "nope", "U1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Booking not found");

    assert!(h.gateway.calls().is_empty());
    let Some(Booking::Tour(tour)) = h.store.booking("B1") else {
        panic!("tour booking missing");
    };
    assert_eq!(tour.users.len(), 2);
    assert_eq!(tour.current_count, 3);
}

#[tokio::test]
async fn test_missing_fields_are_bad_request() {
    let h = harness();

    let (status, body) = post_json(&h.app, "/refund-booking", json!({ "bookingId": "B1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "userId is required");

    let (status, _) = post_json(&h.app, "/refund-booking", json!({ "bookingId": " ", "userId": "U1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hotel_without_timestamp_is_bad_request() {
    let h = harness();
    let Booking::Hotel(mut hotel) = hotel_b2(1) else {
        unreachable!()
    };
    hotel.booked_at = None;
    h.store.insert_booking(Booking::Hotel(hotel));

    let (status, _) = refund(&h.app, "B2", "U9").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.gateway.calls().is_empty());
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_push_failure_does_not_fail_refund() {
    let push = Arc::new(BrokenPush::default());
    let h = harness_with(FakeGateway::default(), push.clone(), RefundPolicy::default());
    h.store.insert_booking(hotel_b2(1));

    let (status, _) = refund(&h.app, "B2", "U9").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(push.attempts.load(Ordering::SeqCst), 2);

    let (status, body) = get_json(&h.app, "/users/U9/notifications").await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);

    // No catalog entry for H1, so the placeholder title is used.
    for note in data {
        assert!(note["message"].as_str().unwrap().contains(FALLBACK_TITLE));
        assert_eq!(note["source"], "hotel");
        assert_eq!(note["isRead"], false);
    }
}

#[tokio::test]
async fn test_title_lookup_failure_falls_back() {
    let h = harness();
    h.store.insert_booking(tour_b1(1));
    h.store.insert_catalog_title(BookingSource::Tour, "T1", "Sunset Canyon Tour");
    h.store.fail_once(FailPoint::CatalogTitle);

    let (status, _) = refund(&h.app, "B1", "U2").await;
    assert_eq!(status, StatusCode::OK);

    let notifications = h.store.list_notifications("U2").await.unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(notifications
        .iter()
        .all(|n| n.message.contains(FALLBACK_TITLE)));
}

// ============================================================================
// Idempotency and recovery
// ============================================================================

#[tokio::test]
async fn test_repeated_hotel_refund_is_rejected() {
    let h = harness();
    h.store.insert_booking(hotel_b2(1));

    let (first, _) = refund(&h.app, "B2", "U9").await;
    let (second, body) = refund(&h.app, "B2", "U9").await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(h.gateway.calls().len(), 1);
    assert_eq!(h.store.list_refunds("B2").await.unwrap().len(), 1);
    assert_eq!(h.store.list_notifications("U9").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_duplicate_refund_reverses_once() {
    let h = harness_with(
        FakeGateway::slow(50),
        Arc::new(LogNotifier),
        RefundPolicy::default(),
    );
    h.store.insert_booking(tour_b1(1));

    let (a, b) = tokio::join!(refund(&h.app, "B1", "U1"), refund(&h.app, "B1", "U1"));
    let mut statuses = vec![a.0, b.0];
    statuses.sort();

    assert_eq!(statuses[0], StatusCode::OK);
    assert_ne!(statuses[1], StatusCode::OK);
    assert_eq!(h.gateway.calls().len(), 1);
    assert_eq!(h.store.list_refunds("B1").await.unwrap().len(), 1);

    let Some(Booking::Tour(tour)) = h.store.booking("B1") else {
        panic!("tour booking missing");
    };
    assert_eq!(tour.current_count, 1);
}

#[tokio::test]
async fn test_failed_reversal_can_be_retried() {
    let h = harness();
    h.store.insert_booking(hotel_b2(1));
    h.gateway.fail_next.store(true, Ordering::SeqCst);

    let (status, body) = refund(&h.app, "B2", "U9").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Refund failed");
    assert_eq!(body["error"], "payment_provider_error");
    assert!(!body.to_string().contains("charge_already_refunded"));

    let Some(Booking::Hotel(hotel)) = h.store.booking("B2") else {
        panic!("hotel booking missing");
    };
    assert!(!hotel.is_refunded);
    assert_eq!(h.store.sagas()[0].next_step, SagaStep::Failed);

    let (status, _) = refund(&h.app, "B2", "U9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.gateway.calls().len(), 1);
    assert_eq!(h.store.sagas().len(), 1);
}

#[tokio::test]
async fn test_interrupted_saga_is_resumed() {
    let h = harness();
    h.store.insert_booking(tour_b1(1));
    h.store.fail_once(FailPoint::AppendRefund);

    let (status, body) = refund(&h.app, "B1", "U1").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "store_error");

    // Reversal and booking update happened; the audit step did not.
    assert_eq!(h.gateway.calls().len(), 1);
    let saga = h.store.sagas().remove(0);
    assert_eq!(saga.next_step, SagaStep::RecordAudit);
    assert!(saga.provider_refund_id.is_some());
    assert!(h.store.list_refunds("B1").await.unwrap().is_empty());

    // A retried request must not start a second saga.
    let (status, _) = refund(&h.app, "B1", "U1").await;
    assert_ne!(status, StatusCode::OK);

    // Sagas inside the grace window are left alone.
    let completed = h.workflow.resume_pending(Duration::minutes(5)).await.unwrap();
    assert_eq!(completed, 0);

    h.store.age_saga(saga.id, Duration::minutes(10));
    let completed = h.workflow.resume_pending(Duration::minutes(5)).await.unwrap();
    assert_eq!(completed, 1);

    assert_eq!(h.gateway.calls().len(), 1);
    assert_eq!(h.store.list_refunds("B1").await.unwrap().len(), 1);
    assert_eq!(h.store.list_notifications("U1").await.unwrap().len(), 2);
    assert_eq!(h.store.sagas()[0].next_step, SagaStep::Completed);

    let Some(Booking::Tour(tour)) = h.store.booking("B1") else {
        panic!("tour booking missing");
    };
    assert_eq!(tour.current_count, 1);
}

#[tokio::test]
async fn test_lost_reversal_reply_is_replayed_with_same_key() {
    let h = harness();
    h.store.insert_booking(hotel_b2(1));
    h.gateway.lose_next_reply.store(true, Ordering::SeqCst);

    let (status, body) = refund(&h.app, "B2", "U9").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "payment_provider_error");

    // The provider may have refunded, so the saga must stay on the reversal.
    let saga = h.store.sagas().remove(0);
    assert_eq!(saga.next_step, SagaStep::ReversePayment);
    assert!(saga.failure_reason.is_none());

    let (status, _) = refund(&h.app, "B2", "U9").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(h.gateway.calls().len(), 1);

    h.store.age_saga(saga.id, Duration::minutes(10));
    let completed = h.workflow.resume_pending(Duration::minutes(5)).await.unwrap();
    assert_eq!(completed, 1);

    assert_eq!(h.gateway.calls().len(), 2);
    assert_eq!(h.gateway.distinct_refunds(), 1);
    let sagas = h.store.sagas();
    assert_eq!(sagas.len(), 1);
    assert_eq!(sagas[0].id, saga.id);
    assert_eq!(sagas[0].next_step, SagaStep::Completed);

    let Some(Booking::Hotel(hotel)) = h.store.booking("B2") else {
        panic!("hotel booking missing");
    };
    assert!(hotel.is_refunded);
    assert_eq!(h.store.list_refunds("B2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recovery_claims_a_stalled_saga_once() {
    let h = harness();
    h.store.insert_booking(tour_b1(1));
    h.store.fail_once(FailPoint::AppendRefund);
    refund(&h.app, "B1", "U1").await;

    let saga = h.store.sagas().remove(0);
    h.store.age_saga(saga.id, Duration::minutes(10));
    let stale = h.store.sagas().remove(0);

    assert!(h.store.touch_saga(stale.id, stale.updated_at).await.unwrap());
    assert!(!h.store.touch_saga(stale.id, stale.updated_at).await.unwrap());

    // The winner refreshed it, so a second recovery pass leaves it alone.
    let completed = h.workflow.resume_pending(Duration::minutes(5)).await.unwrap();
    assert_eq!(completed, 0);
    assert!(h.store.list_refunds("B1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replayed_reversal_reuses_idempotency_key() {
    let h = harness();
    h.store.insert_booking(hotel_b2(1));
    h.store.fail_once(FailPoint::CancelHotelBooking);

    let (status, _) = refund(&h.app, "B2", "U9").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // Simulate a crash right after the provider call: rewind to the reversal step.
    let saga = h.store.sagas().remove(0);
    h.store
        .advance_saga(saga.id, SagaStep::ReversePayment, None)
        .await
        .unwrap();
    let saga = h.store.sagas().remove(0);
    h.workflow.resume(saga).await.unwrap();

    assert_eq!(h.gateway.calls().len(), 2);
    assert_eq!(h.gateway.distinct_refunds(), 1);
    assert_eq!(h.store.list_refunds("B2").await.unwrap().len(), 1);
}

// ============================================================================
// Policy options
// ============================================================================

#[tokio::test]
async fn test_empty_tour_is_cancelled_when_enabled() {
    let policy = RefundPolicy {
        cancel_empty_tours: true,
        ..RefundPolicy::default()
    };
    let h = harness_with(FakeGateway::default(), Arc::new(LogNotifier), policy);
    h.store.insert_booking(tour_b1(1));

    assert_eq!(refund(&h.app, "B1", "U1").await.0, StatusCode::OK);
    let Some(Booking::Tour(tour)) = h.store.booking("B1") else {
        panic!("tour booking missing");
    };
    assert_eq!(tour.status, BookingStatus::Active);

    assert_eq!(refund(&h.app, "B1", "U2").await.0, StatusCode::OK);
    let Some(Booking::Tour(tour)) = h.store.booking("B1") else {
        panic!("tour booking missing");
    };
    assert!(tour.users.is_empty());
    assert_eq!(tour.current_count, 0);
    assert_eq!(tour.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_empty_tour_stays_active_by_default() {
    let h = harness();
    h.store.insert_booking(tour_b1(1));

    refund(&h.app, "B1", "U1").await;
    refund(&h.app, "B1", "U2").await;

    let Some(Booking::Tour(tour)) = h.store.booking("B1") else {
        panic!("tour booking missing");
    };
    assert!(tour.users.is_empty());
    assert_eq!(tour.status, BookingStatus::Active);
}

// ============================================================================
// Other routes
// ============================================================================

#[tokio::test]
async fn test_create_payment_intent() {
    let h = harness();

    let (status, body) = post_json(&h.app, "/create-payment-intent", json!({ "amount": 4999 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "clientSecret": "pi_test_secret_4999" }));

    let (status, body) = post_json(&h.app, "/create-payment-intent", json!({ "amount": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_liveness_and_refund_listing() {
    let h = harness();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Booking payments backend is running");

    let (status, body) = get_json(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    h.store.insert_booking(tour_b1(1));
    refund(&h.app, "B1", "U2").await;
    let (status, body) = get_json(&h.app, "/bookings/B1/refunds").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["userId"], "U2");
    assert_eq!(body["data"][0]["refundId"], "pi_2");
    assert_eq!(body["data"][0]["persons"], 1);
}
