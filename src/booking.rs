//! Booking shapes and refund eligibility.
//!
//! A booking is either a single-owner hotel stay or a group tour with one
//! entry per participant. Eligibility is decided here without touching any
//! collaborator: [`Booking::plan_refund`] either returns a [`RefundPlan`]
//! describing what the saga must do, or the error the caller should see.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RefundError;
use crate::payments::PaymentReference;

/// Booking type. Records written before hotels existed carry no `source`
/// and are read as [`BookingSource::Tour`] via [`BookingSource::from_stored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingSource {
    Hotel,
    Tour,
}

impl BookingSource {
    pub const LEGACY_DEFAULT: BookingSource = BookingSource::Tour;

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingSource::Hotel => "hotel",
            BookingSource::Tour => "tour",
        }
    }

    /// Decode the stored `source` field, applying the legacy default.
    pub fn from_stored(raw: Option<&str>) -> Result<Self, UnknownValue> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::LEGACY_DEFAULT),
            Some(value) => value.parse(),
        }
    }
}

impl fmt::Display for BookingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingSource {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hotel" => Ok(BookingSource::Hotel),
            "tour" => Ok(BookingSource::Tour),
            other => Err(UnknownValue::new("booking source", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BookingStatus::Active),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(UnknownValue::new("booking status", other)),
        }
    }
}

/// A stored enum value this build does not recognise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelBooking {
    pub id: String,
    pub user_id: String,
    pub hotel_id: Option<String>,
    /// Raw stored payment field (`stripeCustomerId` on the wire). Holds either
    /// a payment intent id or its client-secret form.
    #[serde(rename = "stripeCustomerId")]
    pub payment_ref: Option<String>,
    /// Display only; refunds always reverse the full charge.
    pub total_price: Option<i64>,
    pub status: BookingStatus,
    pub is_refunded: bool,
    #[serde(rename = "timestamp")]
    pub booked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourBooking {
    pub id: String,
    pub tour_id: Option<String>,
    pub status: BookingStatus,
    pub current_count: i32,
    pub users: Vec<Participant>,
}

impl TourBooking {
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.users.iter().find(|p| p.user_id == user_id)
    }
}

/// One entry of a tour booking's `users` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    #[serde(rename = "stripeCustomerId")]
    pub payment_ref: Option<String>,
    pub persons: Option<i32>,
    #[serde(rename = "timestamp")]
    pub booked_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// Party size, treating an unset or non-positive value as one person.
    pub fn party_size(&self) -> i32 {
        match self.persons {
            Some(n) if n > 0 => n,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Booking {
    Hotel(HotelBooking),
    Tour(TourBooking),
}

/// Everything the refund saga needs, resolved up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPlan {
    pub booking_id: String,
    pub user_id: String,
    pub source: BookingSource,
    pub payment_intent: String,
    pub persons: i32,
    /// `hotelId` or `tourId`, used to look up a display title.
    pub item_id: Option<String>,
}

impl Booking {
    pub fn id(&self) -> &str {
        match self {
            Booking::Hotel(b) => &b.id,
            Booking::Tour(b) => &b.id,
        }
    }

    pub fn source(&self) -> BookingSource {
        match self {
            Booking::Hotel(_) => BookingSource::Hotel,
            Booking::Tour(_) => BookingSource::Tour,
        }
    }

    pub fn status(&self) -> BookingStatus {
        match self {
            Booking::Hotel(b) => b.status,
            Booking::Tour(b) => b.status,
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            Booking::Hotel(b) => b.hotel_id.as_deref(),
            Booking::Tour(b) => b.tour_id.as_deref(),
        }
    }

    /// Check every refund precondition for `user_id` at `now`.
    ///
    /// Order matters for the status a caller sees: the booking timestamp is
    /// resolved first, then the window, then ownership and the payment
    /// reference.
    pub fn plan_refund(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<RefundPlan, RefundError> {
        match self {
            Booking::Hotel(hotel) => {
                let booked_at = hotel.booked_at.ok_or_else(|| {
                    RefundError::BadRequest("Booking timestamp is missing".into())
                })?;
                ensure_within_window(booked_at, now, window)?;

                if hotel.user_id != user_id {
                    return Err(RefundError::Forbidden(
                        "You are not allowed to refund this booking".into(),
                    ));
                }
                if hotel.is_refunded {
                    return Err(RefundError::Conflict(
                        "Booking has already been refunded".into(),
                    ));
                }

                let reference = resolve_reference(hotel.payment_ref.as_deref())?;
                Ok(RefundPlan {
                    booking_id: hotel.id.clone(),
                    user_id: user_id.to_string(),
                    source: BookingSource::Hotel,
                    payment_intent: reference.into_inner(),
                    persons: 1,
                    item_id: hotel.hotel_id.clone(),
                })
            }
            Booking::Tour(tour) => {
                let participant = tour.participant(user_id).ok_or_else(|| {
                    RefundError::NotFound("User not found in this booking".into())
                })?;
                let booked_at = participant.booked_at.ok_or_else(|| {
                    RefundError::NotFound("Booking timestamp not found for this user".into())
                })?;
                ensure_within_window(booked_at, now, window)?;

                let reference = resolve_reference(participant.payment_ref.as_deref())?;
                Ok(RefundPlan {
                    booking_id: tour.id.clone(),
                    user_id: user_id.to_string(),
                    source: BookingSource::Tour,
                    payment_intent: reference.into_inner(),
                    persons: participant.party_size(),
                    item_id: tour.tour_id.clone(),
                })
            }
        }
    }
}

fn ensure_within_window(
    booked_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(), RefundError> {
    if now - booked_at > window {
        return Err(RefundError::Forbidden(format!(
            "Refund window expired ({} hours)",
            window.num_hours()
        )));
    }
    Ok(())
}

fn resolve_reference(raw: Option<&str>) -> Result<PaymentReference, RefundError> {
    raw.and_then(PaymentReference::parse)
        .ok_or_else(|| RefundError::BadRequest("Payment reference is missing".into()))
}
