//! # Booking Refunds Service
//!
//! Payment intents for hotel and tour bookings, and refunds run as a
//! persisted saga so an interrupted refund can be finished after a restart.
//!
//! ## Architecture
//!
//! - Axum handles HTTP routing and request/response lifecycle
//! - SQLx stores bookings, saga progress, refunds and notifications in Postgres
//! - Stripe is reached over its REST API with reqwest
//! - A background task resumes sagas that stopped between steps

use std::sync::Arc;

use booking_refunds::config::AppConfig;
use booking_refunds::handlers::refund::{RefundPolicy, RefundWorkflow};
use booking_refunds::notify::{FcmNotifier, PushNotifier};
use booking_refunds::payments::StripeClient;
use booking_refunds::store::PgRefundStore;
use booking_refunds::{create_app, db, worker, AppState};
use chrono::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_refunds=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting booking refunds service");

    let pool = db::connect(&config.database).await?;

    let store = Arc::new(PgRefundStore::new(pool));
    let payments = Arc::new(StripeClient::new(&config.stripe)?);
    let notifier: Arc<dyn PushNotifier> = Arc::from(FcmNotifier::from_config(&config.push));
    let policy = RefundPolicy {
        window: Duration::hours(config.refund.window_hours),
        cancel_empty_tours: config.refund.auto_cancel_empty_tours,
    };

    let workflow = Arc::new(RefundWorkflow::new(store, payments.clone(), notifier, policy));

    worker::spawn_recovery_worker(
        workflow.clone(),
        std::time::Duration::from_secs(config.refund.recovery_interval_secs),
        Duration::seconds(config.refund.recovery_grace_secs),
    );

    let app = create_app(AppState {
        workflow,
        payments,
        currency: config.stripe.currency.clone(),
    });

    // Bind and serve
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
