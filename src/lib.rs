//! # Booking Refunds Library
//!
//! Exposes the Axum router and modules so integration tests can create
//! an in-process server with in-memory collaborators.

pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod payments;
pub mod routes;
pub mod store;
pub mod worker;

use std::sync::Arc;

use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::refund::RefundWorkflow;
use crate::payments::PaymentGateway;

/// Collaborators shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<RefundWorkflow>,
    pub payments: Arc<dyn PaymentGateway>,
    /// Currency for new payment intents.
    pub currency: String,
}

/// Build the Axum router with all route modules and middleware.
///
/// This function does NOT start a server or spawn the recovery worker.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::payments::router())
        .merge(routes::refunds::router())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
