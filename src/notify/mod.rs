//! Notification dispatch boundary
//!
//! Fire-and-forget delivery to a partner's registered contact channel when
//! a lead reaches a terminal status. Dispatch failures are logged and never
//! affect the originating request; the core only consumes a success flag.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::leads::LeadStatus;
use crate::types::{Result, TrellisError};

/// Event kinds that reach the lead owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadEvent {
    LeadContracted,
    LeadCancelled,
}

impl LeadEvent {
    /// The event a status entry produces, if any
    pub fn from_status(status: LeadStatus) -> Option<Self> {
        match status {
            LeadStatus::Contracted => Some(Self::LeadContracted),
            LeadStatus::Cancelled => Some(Self::LeadCancelled),
            LeadStatus::New | LeadStatus::InProgress => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadContracted => "lead_contracted",
            Self::LeadCancelled => "lead_cancelled",
        }
    }
}

/// Outbound notification boundary
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch one notification; returns whether delivery was accepted
    async fn notify(&self, contact: &str, event: LeadEvent) -> bool;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    contact: &'a str,
    event: &'a str,
}

/// Chat-webhook style notifier posting JSON to a configured URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| TrellisError::Config(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, contact: &str, event: LeadEvent) -> bool {
        let payload = WebhookPayload {
            contact,
            event: event.as_str(),
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(event = event.as_str(), "Notification dispatched");
                true
            }
            Ok(response) => {
                warn!(
                    event = event.as_str(),
                    status = %response.status(),
                    "Notification webhook rejected"
                );
                false
            }
            Err(e) => {
                warn!(event = event.as_str(), "Notification dispatch failed: {}", e);
                false
            }
        }
    }
}

/// No-op notifier for dev mode or when no webhook is configured
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _contact: &str, event: LeadEvent) -> bool {
        debug!(event = event.as_str(), "Notification suppressed (no webhook configured)");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_status() {
        assert_eq!(
            LeadEvent::from_status(LeadStatus::Contracted),
            Some(LeadEvent::LeadContracted)
        );
        assert_eq!(
            LeadEvent::from_status(LeadStatus::Cancelled),
            Some(LeadEvent::LeadCancelled)
        );
        assert_eq!(LeadEvent::from_status(LeadStatus::New), None);
        assert_eq!(LeadEvent::from_status(LeadStatus::InProgress), None);
    }
}
