//! Document-store seam used by the refund saga.
//!
//! Every write is keyed so that replaying a saga step after a crash leaves
//! the same state as running it once.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::booking::{Booking, BookingSource};
use crate::models::{Notification, RefundRecord, RefundSaga, SagaClaim, SagaStep};

pub use memory::MemoryRefundStore;
pub use postgres::PgRefundStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("saga {0} not found")]
    SagaNotFound(Uuid),

    /// Raised by the in-memory store when a failure has been injected.
    #[error("injected failure at {0}")]
    Injected(&'static str),
}

#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn load_booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError>;

    /// Display title of the hotel or tour a booking points at.
    async fn catalog_title(
        &self,
        source: BookingSource,
        item_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Insert `saga` unless another non-failed saga owns its
    /// `(booking_id, user_id)` pair. A failed saga is replaced; sagas only
    /// fail when the provider declined the reversal outright.
    async fn claim_saga(&self, saga: RefundSaga) -> Result<SagaClaim, StoreError>;

    async fn advance_saga(
        &self,
        saga_id: Uuid,
        next_step: SagaStep,
        provider_refund_id: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn fail_saga(&self, saga_id: Uuid, reason: &str) -> Result<(), StoreError>;

    /// Bump `updated_at` only if it still equals `seen`. Returns whether this
    /// caller won the saga; a concurrent recovery pass loses.
    async fn touch_saga(&self, saga_id: Uuid, seen: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Non-terminal sagas last touched at or before `older_than`.
    async fn pending_sagas(&self, older_than: DateTime<Utc>) -> Result<Vec<RefundSaga>, StoreError>;

    /// Mark a hotel booking cancelled and refunded.
    async fn cancel_hotel_booking(&self, booking_id: &str) -> Result<(), StoreError>;

    /// Drop a tour participant and subtract `persons` from the head count,
    /// atomically. A no-op when the participant is already gone.
    async fn remove_participant(
        &self,
        booking_id: &str,
        user_id: &str,
        persons: i32,
        cancel_when_empty: bool,
    ) -> Result<(), StoreError>;

    /// Set the user's mirror copy of the booking to cancelled.
    async fn cancel_user_booking(&self, user_id: &str, booking_id: &str) -> Result<(), StoreError>;

    async fn append_refund(&self, record: &RefundRecord) -> Result<(), StoreError>;

    /// Keyed by `(saga_id, kind)`; a duplicate is ignored.
    async fn append_notification(&self, notification: &Notification) -> Result<(), StoreError>;

    async fn list_refunds(&self, booking_id: &str) -> Result<Vec<RefundRecord>, StoreError>;

    async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, StoreError>;
}
