//! Postgres-backed [`RefundStore`].
//!
//! Tour participants live in their own table so removing one and adjusting
//! the head count can share a transaction. Saga ownership of a
//! `(booking_id, user_id)` pair is enforced by a unique constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{RefundStore, StoreError};
use crate::booking::{
    Booking, BookingSource, BookingStatus, HotelBooking, Participant, TourBooking,
};
use crate::models::{Notification, RefundRecord, RefundSaga, SagaClaim, SagaStep};

// ============================================================================
// Row types (sqlx::FromRow)
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: String,
    source: Option<String>,
    status: String,
    is_refunded: bool,
    user_id: Option<String>,
    stripe_customer_id: Option<String>,
    total_price: Option<i64>,
    hotel_id: Option<String>,
    tour_id: Option<String>,
    current_count: i32,
    booked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    user_id: String,
    stripe_customer_id: Option<String>,
    persons: Option<i32>,
    booked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct SagaRow {
    id: Uuid,
    booking_id: String,
    user_id: String,
    source: String,
    payment_intent: String,
    persons: i32,
    item_id: Option<String>,
    next_step: String,
    provider_refund_id: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    booking_id: String,
    user_id: String,
    source: String,
    refund_id: String,
    provider_refund_id: Option<String>,
    persons: i32,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    saga_id: Uuid,
    user_id: String,
    title: String,
    message: String,
    kind: String,
    source: String,
    item_id: Option<String>,
    booking_id: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

fn corrupt(e: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(e.to_string())
}

impl TryFrom<SagaRow> for RefundSaga {
    type Error = StoreError;

    fn try_from(row: SagaRow) -> Result<Self, Self::Error> {
        Ok(RefundSaga {
            id: row.id,
            booking_id: row.booking_id,
            user_id: row.user_id,
            source: row.source.parse().map_err(corrupt)?,
            payment_intent: row.payment_intent,
            persons: row.persons,
            item_id: row.item_id,
            next_step: row.next_step.parse().map_err(corrupt)?,
            provider_refund_id: row.provider_refund_id,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<RefundRow> for RefundRecord {
    type Error = StoreError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        Ok(RefundRecord {
            id: row.id,
            booking_id: row.booking_id,
            user_id: row.user_id,
            source: row.source.parse().map_err(corrupt)?,
            refund_id: row.refund_id,
            provider_refund_id: row.provider_refund_id,
            persons: row.persons,
            status: row.status,
            timestamp: row.created_at,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            saga_id: row.saga_id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            kind: row.kind.parse().map_err(corrupt)?,
            source: row.source.parse().map_err(corrupt)?,
            item_id: row.item_id,
            booking_id: row.booking_id,
            timestamp: row.created_at,
            is_read: row.is_read,
        })
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgRefundStore {
    pool: PgPool,
}

impl PgRefundStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_participants(&self, booking_id: &str) -> Result<Vec<Participant>, StoreError> {
        let rows: Vec<ParticipantRow> = sqlx::query_as(
            r#"
            SELECT user_id, stripe_customer_id, persons, booked_at
            FROM booking_participants
            WHERE booking_id = $1
            ORDER BY position
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Participant {
                user_id: row.user_id,
                payment_ref: row.stripe_customer_id,
                persons: row.persons,
                booked_at: row.booked_at,
            })
            .collect())
    }
}

#[async_trait]
impl RefundStore for PgRefundStore {
    async fn load_booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, source, status, is_refunded, user_id, stripe_customer_id,
                   total_price, hotel_id, tour_id, current_count, booked_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: BookingStatus = row.status.parse().map_err(corrupt)?;
        let booking = match BookingSource::from_stored(row.source.as_deref()).map_err(corrupt)? {
            BookingSource::Hotel => Booking::Hotel(HotelBooking {
                user_id: row.user_id.ok_or_else(|| {
                    StoreError::Corrupt(format!("hotel booking {} has no owner", row.id))
                })?,
                id: row.id,
                hotel_id: row.hotel_id,
                payment_ref: row.stripe_customer_id,
                total_price: row.total_price,
                status,
                is_refunded: row.is_refunded,
                booked_at: row.booked_at,
            }),
            BookingSource::Tour => Booking::Tour(TourBooking {
                users: self.load_participants(&row.id).await?,
                id: row.id,
                tour_id: row.tour_id,
                status,
                current_count: row.current_count,
            }),
        };
        Ok(Some(booking))
    }

    async fn catalog_title(
        &self,
        source: BookingSource,
        item_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let query = match source {
            BookingSource::Hotel => "SELECT name FROM hotels WHERE id = $1",
            BookingSource::Tour => "SELECT title FROM tours WHERE id = $1",
        };
        let title: Option<String> = sqlx::query_scalar(query)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(title)
    }

    async fn claim_saga(&self, saga: RefundSaga) -> Result<SagaClaim, StoreError> {
        // A saga only fails on a definitive decline, so nothing was reversed
        // and the row may start over under a fresh id. Any other row wins.
        let claimed: Option<SagaRow> = sqlx::query_as(
            r#"
            INSERT INTO refund_sagas
                (id, booking_id, user_id, source, payment_intent, persons, item_id,
                 next_step, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT (booking_id, user_id) DO UPDATE SET
                id = EXCLUDED.id,
                source = EXCLUDED.source,
                payment_intent = EXCLUDED.payment_intent,
                persons = EXCLUDED.persons,
                item_id = EXCLUDED.item_id,
                next_step = EXCLUDED.next_step,
                provider_refund_id = NULL,
                failure_reason = NULL,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            WHERE refund_sagas.next_step = 'failed'
            RETURNING *
            "#,
        )
        .bind(saga.id)
        .bind(&saga.booking_id)
        .bind(&saga.user_id)
        .bind(saga.source.as_str())
        .bind(&saga.payment_intent)
        .bind(saga.persons)
        .bind(&saga.item_id)
        .bind(saga.next_step.as_str())
        .bind(saga.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = claimed {
            return Ok(SagaClaim::Claimed(row.try_into()?));
        }

        let existing: SagaRow = sqlx::query_as(
            "SELECT * FROM refund_sagas WHERE booking_id = $1 AND user_id = $2",
        )
        .bind(&saga.booking_id)
        .bind(&saga.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(SagaClaim::Existing(existing.try_into()?))
    }

    async fn advance_saga(
        &self,
        saga_id: Uuid,
        next_step: SagaStep,
        provider_refund_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refund_sagas
            SET next_step = $2,
                provider_refund_id = COALESCE($3, provider_refund_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(saga_id)
        .bind(next_step.as_str())
        .bind(provider_refund_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SagaNotFound(saga_id));
        }
        Ok(())
    }

    async fn fail_saga(&self, saga_id: Uuid, reason: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refund_sagas
            SET next_step = 'failed', failure_reason = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(saga_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SagaNotFound(saga_id));
        }
        Ok(())
    }

    async fn touch_saga(&self, saga_id: Uuid, seen: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refund_sagas
            SET updated_at = NOW()
            WHERE id = $1
              AND updated_at = $2
              AND next_step NOT IN ('completed', 'failed')
            "#,
        )
        .bind(saga_id)
        .bind(seen)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn pending_sagas(&self, older_than: DateTime<Utc>) -> Result<Vec<RefundSaga>, StoreError> {
        let rows: Vec<SagaRow> = sqlx::query_as(
            r#"
            SELECT * FROM refund_sagas
            WHERE next_step NOT IN ('completed', 'failed')
              AND updated_at <= $1
            ORDER BY updated_at
            LIMIT 100
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RefundSaga::try_from).collect()
    }

    async fn cancel_hotel_booking(&self, booking_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', is_refunded = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_participant(
        &self,
        booking_id: &str,
        user_id: &str,
        persons: i32,
        cancel_when_empty: bool,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the booking row so concurrent removals serialise on it.
        sqlx::query("SELECT id FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?;

        let removed = sqlx::query(
            "DELETE FROM booking_participants WHERE booking_id = $1 AND user_id = $2",
        )
        .bind(booking_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            debug!(booking_id = %booking_id, user_id = %user_id, "Participant already removed");
            tx.commit().await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE bookings
            SET current_count = current_count - $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(booking_id)
        .bind(persons)
        .execute(&mut *tx)
        .await?;

        if cancel_when_empty {
            sqlx::query(
                r#"
                UPDATE bookings
                SET status = 'cancelled', updated_at = NOW()
                WHERE id = $1
                  AND NOT EXISTS (SELECT 1 FROM booking_participants WHERE booking_id = $1)
                "#,
            )
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn cancel_user_booking(&self, user_id: &str, booking_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_bookings (user_id, booking_id, status)
            VALUES ($1, $2, 'cancelled')
            ON CONFLICT (user_id, booking_id)
            DO UPDATE SET status = 'cancelled', updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(booking_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_refund(&self, record: &RefundRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refunds
                (id, booking_id, user_id, source, refund_id, provider_refund_id,
                 persons, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.booking_id)
        .bind(&record.user_id)
        .bind(record.source.as_str())
        .bind(&record.refund_id)
        .bind(&record.provider_refund_id)
        .bind(record.persons)
        .bind(&record.status)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, saga_id, user_id, title, message, kind, source, item_id,
                 booking_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (saga_id, kind) DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(notification.saga_id)
        .bind(&notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.source.as_str())
        .bind(&notification.item_id)
        .bind(&notification.booking_id)
        .bind(notification.is_read)
        .bind(notification.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_refunds(&self, booking_id: &str) -> Result<Vec<RefundRecord>, StoreError> {
        let rows: Vec<RefundRow> = sqlx::query_as(
            "SELECT * FROM refunds WHERE booking_id = $1 ORDER BY created_at",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RefundRecord::try_from).collect()
    }

    async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }
}
