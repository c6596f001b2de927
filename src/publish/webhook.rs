//! HTTP webhook implementation of [`PublishTrigger`].

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::publish::PublishTrigger;

/// Posts a publish request to a configured URL with a short timeout.
pub struct WebhookPublisher {
    client: reqwest::Client,
    config: PublishConfig,
}

impl WebhookPublisher {
    pub fn new(config: PublishConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

/// Body sent to the publish webhook.
pub fn publish_payload(campaign_ids: &[Uuid]) -> serde_json::Value {
    json!({
        "action": "publish",
        "timestamp": Utc::now().to_rfc3339(),
        "campaign_ids": campaign_ids.iter().map(Uuid::to_string).collect::<Vec<_>>(),
    })
}

#[async_trait]
impl PublishTrigger for WebhookPublisher {
    fn is_configured(&self) -> bool {
        self.config.webhook_url.is_some()
    }

    async fn trigger(&self, campaign_ids: &[Uuid]) -> Result<(), PublishError> {
        let url = self
            .config
            .webhook_url
            .as_deref()
            .ok_or(PublishError::NotConfigured)?;

        let resp = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .json(&publish_payload(campaign_ids))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PublishError::Timeout {
                        timeout: self.config.timeout,
                    }
                } else {
                    PublishError::RequestFailed(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Publish webhook rejected request: {body}");
            return Err(PublishError::Status {
                status: status.as_u16(),
            });
        }

        tracing::info!(campaigns = campaign_ids.len(), "Publish webhook triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn payload_lists_campaigns() {
        let id = Uuid::new_v4();
        let payload = publish_payload(&[id]);
        assert_eq!(payload["action"], "publish");
        assert_eq!(payload["campaign_ids"][0], id.to_string());
        assert!(payload["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn unconfigured_webhook_is_an_error() {
        let publisher = WebhookPublisher::new(PublishConfig::default());
        assert!(!publisher.is_configured());
        assert!(matches!(
            publisher.trigger(&[]).await,
            Err(PublishError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn unreachable_webhook_fails_without_retry() {
        let publisher = WebhookPublisher::new(PublishConfig {
            webhook_url: Some("http://127.0.0.1:9/publish".into()),
            timeout: Duration::from_secs(2),
        });
        assert!(publisher.is_configured());
        let err = publisher.trigger(&[Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::RequestFailed(_) | PublishError::Timeout { .. }
        ));
    }
}
