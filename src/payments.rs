//! Payment provider seam.
//!
//! [`PaymentGateway`] is what the routes and the refund saga depend on;
//! [`StripeClient`] is the production implementation talking to the Stripe
//! REST API with `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::StripeConfig;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment provider returned {status}: {message}")]
    Provider { status: u16, message: String },
}

impl PaymentError {
    /// Whether the provider definitely did not act on the request.
    ///
    /// Transport errors, timeouts, 5xx, 409 (idempotent request still in
    /// flight) and 429 leave the outcome unknown: the charge may already be
    /// reversed, so the request must be replayed with the same key.
    pub fn is_definitive(&self) -> bool {
        match self {
            PaymentError::Http(_) => false,
            PaymentError::Provider { status, .. } => {
                (400..500).contains(status) && *status != 409 && *status != 429
            }
        }
    }
}

/// A created charge intent. Only the client secret goes back to the app.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// A refund as acknowledged by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRefund {
    pub id: String,
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Reverse a charge. `amount: None` refunds the full captured amount.
    ///
    /// Calls sharing an `idempotency_key` must resolve to the same refund.
    async fn refund(
        &self,
        payment_intent: &str,
        amount: Option<i64>,
        idempotency_key: &str,
    ) -> Result<ProviderRefund, PaymentError>;
}

/// Payment intent id extracted from a stored payment field.
///
/// Bookings store either the bare intent id (`pi_123`) or the client secret
/// handed to the app (`pi_123_secret_abc`); both resolve to `pi_123`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReference(String);

impl PaymentReference {
    const SECRET_SEPARATOR: &'static str = "_secret_";

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let id = match raw.split_once(Self::SECRET_SEPARATOR) {
            Some((prefix, _)) => prefix,
            None => raw,
        };
        if id.is_empty() {
            return None;
        }
        Some(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    /// Requests time out after `config.timeout_secs`, which config
    /// validation keeps below the recovery grace period.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn read_error(response: reqwest::Response) -> PaymentError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorBody>(&text)
            .ok()
            .and_then(|body| body.error.message.or(body.error.code))
            .unwrap_or(text);
        PaymentError::Provider { status, message }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let amount = amount.to_string();
        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("amount", amount.as_str()), ("currency", currency)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let intent: PaymentIntent = response.json().await?;
        debug!(intent_id = %intent.id, "Created payment intent");
        Ok(intent)
    }

    async fn refund(
        &self,
        payment_intent: &str,
        amount: Option<i64>,
        idempotency_key: &str,
    ) -> Result<ProviderRefund, PaymentError> {
        let mut form = vec![("payment_intent", payment_intent.to_string())];
        if let Some(amount) = amount {
            form.push(("amount", amount.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/refunds", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", idempotency_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let refund: ProviderRefund = response.json().await?;
        info!(
            refund_id = %refund.id,
            payment_intent = %payment_intent,
            status = ?refund.status,
            "Stripe refund created"
        );
        Ok(refund)
    }
}
