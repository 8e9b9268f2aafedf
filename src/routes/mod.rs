//! HTTP route modules.
//!
//! - `health`: liveness probes
//! - `payments`: payment intent creation for the checkout flow
//! - `refunds`: booking refunds plus the audit and notification read paths

pub mod health;
pub mod payments;
pub mod refunds;
