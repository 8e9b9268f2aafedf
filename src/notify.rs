//! Push delivery to a user's topic.
//!
//! Delivery is best-effort: the refund saga logs a failed push and moves on.
//! The durable notification record is written by the store, not here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PushConfig;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push rejected with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Data payload attached to a push message. FCM requires string values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushData {
    pub kind: String,
    pub source: String,
    pub item_id: String,
    pub booking_id: String,
}

impl PushData {
    pub fn to_map(&self) -> HashMap<&'static str, String> {
        HashMap::from([
            ("type", self.kind.clone()),
            ("source", self.source.clone()),
            ("itemId", self.item_id.clone()),
            ("bookingId", self.booking_id.clone()),
        ])
    }
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send(
        &self,
        topic: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<(), PushError>;
}

/// Used when no FCM credentials are configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl PushNotifier for LogNotifier {
    async fn send(
        &self,
        topic: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<(), PushError> {
        info!(
            topic = %topic,
            kind = %data.kind,
            booking_id = %data.booking_id,
            "Push (not delivered): {} - {}", title, body
        );
        Ok(())
    }
}

/// FCM HTTP v1 topic messages.
#[derive(Debug, Clone)]
pub struct FcmNotifier {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl FcmNotifier {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(project_id: &str, access_token: &str) -> Result<Self, PushError> {
        let client = Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "https://fcm.googleapis.com/v1/projects/{}/messages:send",
                project_id
            ),
            access_token: access_token.to_string(),
        })
    }

    /// Pick the FCM notifier when credentials exist, otherwise log only.
    pub fn from_config(config: &PushConfig) -> Box<dyn PushNotifier> {
        match (&config.fcm_project_id, &config.fcm_access_token) {
            (Some(project), Some(token)) => match FcmNotifier::new(project, token) {
                Ok(fcm) => Box::new(fcm),
                Err(e) => {
                    warn!(error = %e, "FCM client unavailable, push will only be logged");
                    Box::new(LogNotifier)
                }
            },
            _ => Box::new(LogNotifier),
        }
    }
}

#[async_trait]
impl PushNotifier for FcmNotifier {
    async fn send(
        &self,
        topic: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<(), PushError> {
        let payload = json!({
            "message": {
                "topic": topic,
                "notification": { "title": title, "body": body },
                "data": data.to_map(),
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected { status, body });
        }

        debug!(topic = %topic, kind = %data.kind, "Push delivered");
        Ok(())
    }
}
