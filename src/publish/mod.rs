//! Publish trigger: tells the downstream publisher to push approved content.

pub mod webhook;

pub use webhook::WebhookPublisher;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PublishError;

/// Fire-and-forget publish signal. Failures are reported once and never retried.
#[async_trait]
pub trait PublishTrigger: Send + Sync {
    /// Whether a downstream endpoint is configured at all.
    fn is_configured(&self) -> bool;

    /// Signal a publish run for the given campaigns (empty = all approved content).
    async fn trigger(&self, campaign_ids: &[Uuid]) -> Result<(), PublishError>;
}
