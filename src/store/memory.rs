//! In-process [`RefundStore`] backed by hash maps.
//!
//! Used by the test suite and for running the router without Postgres.
//! Failures can be injected per operation to exercise saga recovery.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RefundStore, StoreError};
use crate::booking::{Booking, BookingSource, BookingStatus};
use crate::models::{Notification, RefundRecord, RefundSaga, SagaClaim, SagaStep};

/// Operations that can be made to fail once via [`MemoryRefundStore::fail_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    LoadBooking,
    CatalogTitle,
    CancelHotelBooking,
    RemoveParticipant,
    CancelUserBooking,
    AppendRefund,
    AppendNotification,
}

impl FailPoint {
    fn name(&self) -> &'static str {
        match self {
            FailPoint::LoadBooking => "load_booking",
            FailPoint::CatalogTitle => "catalog_title",
            FailPoint::CancelHotelBooking => "cancel_hotel_booking",
            FailPoint::RemoveParticipant => "remove_participant",
            FailPoint::CancelUserBooking => "cancel_user_booking",
            FailPoint::AppendRefund => "append_refund",
            FailPoint::AppendNotification => "append_notification",
        }
    }
}

#[derive(Default)]
struct MemoryState {
    bookings: HashMap<String, Booking>,
    user_bookings: HashMap<(String, String), BookingStatus>,
    catalog: HashMap<(BookingSource, String), String>,
    sagas: HashMap<Uuid, RefundSaga>,
    refunds: Vec<RefundRecord>,
    notifications: Vec<Notification>,
    failures: HashSet<FailPoint>,
}

impl MemoryState {
    fn trip(&mut self, point: FailPoint) -> Result<(), StoreError> {
        if self.failures.remove(&point) {
            return Err(StoreError::Injected(point.name()));
        }
        Ok(())
    }

    fn saga_mut(&mut self, saga_id: Uuid) -> Result<&mut RefundSaga, StoreError> {
        self.sagas
            .get_mut(&saga_id)
            .ok_or(StoreError::SagaNotFound(saga_id))
    }
}

#[derive(Default)]
pub struct MemoryRefundStore {
    state: Mutex<MemoryState>,
}

impl MemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock poisoned")
    }

    pub fn insert_booking(&self, booking: Booking) {
        self.lock()
            .bookings
            .insert(booking.id().to_string(), booking);
    }

    pub fn insert_user_booking(&self, user_id: &str, booking_id: &str, status: BookingStatus) {
        self.lock()
            .user_bookings
            .insert((user_id.to_string(), booking_id.to_string()), status);
    }

    pub fn insert_catalog_title(&self, source: BookingSource, item_id: &str, title: &str) {
        self.lock()
            .catalog
            .insert((source, item_id.to_string()), title.to_string());
    }

    /// Make the next call of `point` fail.
    pub fn fail_once(&self, point: FailPoint) {
        self.lock().failures.insert(point);
    }

    pub fn booking(&self, booking_id: &str) -> Option<Booking> {
        self.lock().bookings.get(booking_id).cloned()
    }

    pub fn user_booking_status(&self, user_id: &str, booking_id: &str) -> Option<BookingStatus> {
        self.lock()
            .user_bookings
            .get(&(user_id.to_string(), booking_id.to_string()))
            .copied()
    }

    pub fn sagas(&self) -> Vec<RefundSaga> {
        self.lock().sagas.values().cloned().collect()
    }

    /// Rewind a saga's `updated_at`, as if it had been idle that long.
    pub fn age_saga(&self, saga_id: Uuid, by: chrono::Duration) {
        if let Some(saga) = self.lock().sagas.get_mut(&saga_id) {
            saga.updated_at = saga.updated_at - by;
        }
    }
}

#[async_trait]
impl RefundStore for MemoryRefundStore {
    async fn load_booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        let mut state = self.lock();
        state.trip(FailPoint::LoadBooking)?;
        Ok(state.bookings.get(booking_id).cloned())
    }

    async fn catalog_title(
        &self,
        source: BookingSource,
        item_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut state = self.lock();
        state.trip(FailPoint::CatalogTitle)?;
        Ok(state.catalog.get(&(source, item_id.to_string())).cloned())
    }

    async fn claim_saga(&self, saga: RefundSaga) -> Result<SagaClaim, StoreError> {
        let mut state = self.lock();
        let existing = state
            .sagas
            .values()
            .find(|s| s.booking_id == saga.booking_id && s.user_id == saga.user_id)
            .cloned();

        match existing {
            Some(current) if current.next_step != SagaStep::Failed => {
                Ok(SagaClaim::Existing(current))
            }
            Some(failed) => {
                state.sagas.remove(&failed.id);
                state.sagas.insert(saga.id, saga.clone());
                Ok(SagaClaim::Claimed(saga))
            }
            None => {
                state.sagas.insert(saga.id, saga.clone());
                Ok(SagaClaim::Claimed(saga))
            }
        }
    }

    async fn advance_saga(
        &self,
        saga_id: Uuid,
        next_step: SagaStep,
        provider_refund_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let saga = state.saga_mut(saga_id)?;
        saga.next_step = next_step;
        if let Some(id) = provider_refund_id {
            saga.provider_refund_id = Some(id.to_string());
        }
        saga.updated_at = Utc::now();
        Ok(())
    }

    async fn fail_saga(&self, saga_id: Uuid, reason: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let saga = state.saga_mut(saga_id)?;
        saga.next_step = SagaStep::Failed;
        saga.failure_reason = Some(reason.to_string());
        saga.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_saga(&self, saga_id: Uuid, seen: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state.sagas.get_mut(&saga_id) {
            Some(saga) if saga.updated_at == seen && !saga.next_step.is_terminal() => {
                saga.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending_sagas(&self, older_than: DateTime<Utc>) -> Result<Vec<RefundSaga>, StoreError> {
        let state = self.lock();
        let mut pending: Vec<RefundSaga> = state
            .sagas
            .values()
            .filter(|s| !s.next_step.is_terminal() && s.updated_at <= older_than)
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.updated_at);
        Ok(pending)
    }

    async fn cancel_hotel_booking(&self, booking_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.trip(FailPoint::CancelHotelBooking)?;
        match state.bookings.get_mut(booking_id) {
            Some(Booking::Hotel(hotel)) => {
                hotel.status = BookingStatus::Cancelled;
                hotel.is_refunded = true;
                Ok(())
            }
            Some(Booking::Tour(_)) => Err(StoreError::Corrupt(format!(
                "booking {} is not a hotel booking",
                booking_id
            ))),
            None => Err(StoreError::Corrupt(format!("booking {} vanished", booking_id))),
        }
    }

    async fn remove_participant(
        &self,
        booking_id: &str,
        user_id: &str,
        persons: i32,
        cancel_when_empty: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.trip(FailPoint::RemoveParticipant)?;
        let tour = match state.bookings.get_mut(booking_id) {
            Some(Booking::Tour(tour)) => tour,
            Some(Booking::Hotel(_)) => {
                return Err(StoreError::Corrupt(format!(
                    "booking {} is not a tour booking",
                    booking_id
                )))
            }
            None => return Err(StoreError::Corrupt(format!("booking {} vanished", booking_id))),
        };

        let before = tour.users.len();
        tour.users.retain(|p| p.user_id != user_id);
        if tour.users.len() == before {
            return Ok(());
        }
        tour.current_count -= persons;
        if cancel_when_empty && tour.users.is_empty() {
            tour.status = BookingStatus::Cancelled;
        }
        Ok(())
    }

    async fn cancel_user_booking(&self, user_id: &str, booking_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.trip(FailPoint::CancelUserBooking)?;
        state
            .user_bookings
            .insert((user_id.to_string(), booking_id.to_string()), BookingStatus::Cancelled);
        Ok(())
    }

    async fn append_refund(&self, record: &RefundRecord) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.trip(FailPoint::AppendRefund)?;
        if !state.refunds.iter().any(|r| r.id == record.id) {
            state.refunds.push(record.clone());
        }
        Ok(())
    }

    async fn append_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.trip(FailPoint::AppendNotification)?;
        let duplicate = state
            .notifications
            .iter()
            .any(|n| n.saga_id == notification.saga_id && n.kind == notification.kind);
        if !duplicate {
            state.notifications.push(notification.clone());
        }
        Ok(())
    }

    async fn list_refunds(&self, booking_id: &str) -> Result<Vec<RefundRecord>, StoreError> {
        Ok(self
            .lock()
            .refunds
            .iter()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }
}
