//! Workflow implementations behind the HTTP routes.
//!
//! - `refund`: the booking refund saga (5 persisted steps)

pub mod refund;
