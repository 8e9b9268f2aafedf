//! # Booking Refund Saga
//!
//! Refunds one user's share of a hotel or tour booking. Preconditions are
//! checked by [`Booking::plan_refund`]; everything after that runs as a saga
//! whose position is persisted before and after each step.
//!
//! ## Steps
//!
//! 1. **reverse_payment**: Full reversal at the provider, keyed by saga id
//! 2. **update_booking**: Cancel the hotel booking or drop the tour participant
//! 3. **update_mirror**: Set the user's mirror copy to cancelled
//! 4. **record_audit**: Append the refund record
//! 5. **notify**: Write `cancel` and `refund` notifications, then push both
//!
//! A reversal the provider definitively declined marks the saga failed so the
//! user can retry. Any other failure, including a reversal whose outcome is
//! unknown, leaves the saga where it stopped; [`RefundWorkflow::resume`] picks
//! it up from there and replays the reversal under the same idempotency key.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::booking::{Booking, BookingSource};
use crate::error::RefundError;
use crate::models::{Notification, NotificationKind, RefundRecord, RefundSaga, SagaClaim, SagaStep};
use crate::notify::{PushData, PushNotifier};
use crate::payments::PaymentGateway;
use crate::store::RefundStore;

/// Title used when the hotel or tour cannot be looked up.
pub const FALLBACK_TITLE: &str = "your booking";

#[derive(Debug, Clone)]
pub struct RefundPolicy {
    pub window: Duration,
    pub cancel_empty_tours: bool,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            cancel_empty_tours: false,
        }
    }
}

/// Result of a completed refund.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcome {
    pub saga_id: uuid::Uuid,
    pub source: BookingSource,
    pub provider_refund_id: Option<String>,
}

impl RefundOutcome {
    pub fn message(&self) -> String {
        format!("Refund processed successfully for {}", self.source)
    }
}

pub struct RefundWorkflow {
    store: Arc<dyn RefundStore>,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn PushNotifier>,
    policy: RefundPolicy,
}

impl RefundWorkflow {
    pub fn new(
        store: Arc<dyn RefundStore>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn PushNotifier>,
        policy: RefundPolicy,
    ) -> Self {
        Self {
            store,
            payments,
            notifier,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn RefundStore> {
        &self.store
    }

    /// Refund `user_id`'s part of `booking_id`.
    pub async fn refund_booking(
        &self,
        booking_id: &str,
        user_id: &str,
    ) -> Result<RefundOutcome, RefundError> {
        let booking: Booking = self
            .store
            .load_booking(booking_id)
            .await?
            .ok_or_else(|| RefundError::NotFound("Booking not found".into()))?;

        let now = Utc::now();
        let plan = booking.plan_refund(user_id, now, self.policy.window)?;

        let saga = match self.store.claim_saga(RefundSaga::from_plan(&plan, now)).await? {
            SagaClaim::Claimed(saga) => saga,
            SagaClaim::Existing(existing) => {
                warn!(
                    booking_id = %booking_id,
                    user_id = %user_id,
                    saga_id = %existing.id,
                    step = %existing.next_step,
                    "Duplicate refund request rejected"
                );
                let message = if existing.next_step == SagaStep::Completed {
                    "Refund already processed for this booking"
                } else {
                    "Refund already in progress for this booking"
                };
                return Err(RefundError::Conflict(message.into()));
            }
        };

        info!(
            booking_id = %booking_id,
            user_id = %user_id,
            source = %plan.source,
            saga_id = %saga.id,
            persons = plan.persons,
            "Refund saga started"
        );

        let saga = self.run(saga).await?;
        Ok(RefundOutcome {
            saga_id: saga.id,
            source: saga.source,
            provider_refund_id: saga.provider_refund_id,
        })
    }

    /// Continue a saga from its persisted step. Does not re-check eligibility.
    pub async fn resume(&self, saga: RefundSaga) -> Result<RefundSaga, RefundError> {
        info!(
            saga_id = %saga.id,
            booking_id = %saga.booking_id,
            step = %saga.next_step,
            "Resuming refund saga"
        );
        self.run(saga).await
    }

    /// Resume every saga idle for at least `grace`. Returns how many finished.
    pub async fn resume_pending(&self, grace: Duration) -> Result<usize, RefundError> {
        let pending = self.store.pending_sagas(Utc::now() - grace).await?;
        let mut completed = 0;
        for saga in pending {
            let saga_id = saga.id;
            match self.store.touch_saga(saga_id, saga.updated_at).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(saga_id = %saga_id, "Saga claimed elsewhere, skipping");
                    continue;
                }
                Err(e) => {
                    error!(saga_id = %saga_id, error = %e, "Failed to claim saga for recovery");
                    continue;
                }
            }
            match self.resume(saga).await {
                Ok(done) if done.next_step == SagaStep::Completed => completed += 1,
                Ok(_) => {}
                Err(e) => error!(saga_id = %saga_id, error = %e, "Refund saga recovery failed"),
            }
        }
        Ok(completed)
    }

    async fn run(&self, mut saga: RefundSaga) -> Result<RefundSaga, RefundError> {
        while !saga.next_step.is_terminal() {
            let step = saga.next_step;
            let provider_refund_id = match self.execute(step, &saga).await {
                Ok(id) => id,
                Err(e) => {
                    error!(
                        saga_id = %saga.id,
                        booking_id = %saga.booking_id,
                        user_id = %saga.user_id,
                        step = %step,
                        error = %e,
                        "Refund saga step failed"
                    );
                    if step == SagaStep::ReversePayment {
                        if matches!(&e, RefundError::Payment(p) if p.is_definitive()) {
                            self.store.fail_saga(saga.id, &e.to_string()).await?;
                        } else {
                            warn!(
                                saga_id = %saga.id,
                                "Reversal outcome unknown, saga left for recovery"
                            );
                        }
                    }
                    return Err(e);
                }
            };

            let next = step.next();
            self.store
                .advance_saga(saga.id, next, provider_refund_id.as_deref())
                .await?;
            if provider_refund_id.is_some() {
                saga.provider_refund_id = provider_refund_id;
            }
            saga.next_step = next;
        }
        Ok(saga)
    }

    /// Run one step. Only the reversal yields a value: the provider refund id.
    async fn execute(
        &self,
        step: SagaStep,
        saga: &RefundSaga,
    ) -> Result<Option<String>, RefundError> {
        match step {
            SagaStep::ReversePayment => {
                let refund = self
                    .payments
                    .refund(&saga.payment_intent, None, &saga.idempotency_key())
                    .await?;
                info!(
                    saga_id = %saga.id,
                    payment_intent = %saga.payment_intent,
                    refund_id = %refund.id,
                    "Payment reversed"
                );
                Ok(Some(refund.id))
            }
            SagaStep::UpdateBooking => {
                match saga.source {
                    BookingSource::Hotel => {
                        self.store.cancel_hotel_booking(&saga.booking_id).await?
                    }
                    BookingSource::Tour => {
                        self.store
                            .remove_participant(
                                &saga.booking_id,
                                &saga.user_id,
                                saga.persons,
                                self.policy.cancel_empty_tours,
                            )
                            .await?
                    }
                }
                Ok(None)
            }
            SagaStep::UpdateMirror => {
                self.store
                    .cancel_user_booking(&saga.user_id, &saga.booking_id)
                    .await?;
                Ok(None)
            }
            SagaStep::RecordAudit => {
                let record = RefundRecord::from_saga(saga, Utc::now());
                self.store.append_refund(&record).await?;
                Ok(None)
            }
            SagaStep::Notify => {
                self.notify(saga).await?;
                Ok(None)
            }
            SagaStep::Completed | SagaStep::Failed => Ok(None),
        }
    }

    async fn notify(&self, saga: &RefundSaga) -> Result<(), RefundError> {
        let title = self.resolve_title(saga).await;
        let now = Utc::now();

        let notifications: Vec<Notification> = NotificationKind::ALL
            .iter()
            .map(|kind| Notification::for_saga(saga, *kind, &title, now))
            .collect();

        for notification in &notifications {
            self.store.append_notification(notification).await?;
        }

        for notification in &notifications {
            let data = PushData {
                kind: notification.kind.as_str().to_string(),
                source: saga.source.as_str().to_string(),
                item_id: saga.item_id.clone().unwrap_or_default(),
                booking_id: saga.booking_id.clone(),
            };
            if let Err(e) = self
                .notifier
                .send(&saga.user_id, &notification.title, &notification.message, &data)
                .await
            {
                warn!(
                    saga_id = %saga.id,
                    user_id = %saga.user_id,
                    kind = %data.kind,
                    error = %e,
                    "Push delivery failed"
                );
            }
        }
        Ok(())
    }

    async fn resolve_title(&self, saga: &RefundSaga) -> String {
        let Some(item_id) = saga.item_id.as_deref() else {
            return FALLBACK_TITLE.to_string();
        };
        match self.store.catalog_title(saga.source, item_id).await {
            Ok(Some(title)) => title,
            Ok(None) => FALLBACK_TITLE.to_string(),
            Err(e) => {
                warn!(saga_id = %saga.id, item_id = %item_id, error = %e, "Title lookup failed");
                FALLBACK_TITLE.to_string()
            }
        }
    }
}
