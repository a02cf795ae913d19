use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;

use super::{http_client, AlertSink, ClientError};
use crate::alerts::AlertPayload;
use crate::config::DiscordConfig;

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    embeds: Vec<Embed<'a>>,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    timestamp: String,
}

/// Posts alerts as embeds to a Discord webhook.
pub struct DiscordClient {
    client: reqwest::Client,
    webhook_url: String,
    username: String,
    avatar_url: Option<String>,
}

impl DiscordClient {
    /// `None` when no webhook URL is configured.
    pub fn from_config(config: &DiscordConfig) -> Result<Option<Self>, ClientError> {
        let Some(webhook_url) = config.webhook_url.clone().filter(|u| !u.trim().is_empty()) else {
            warn!("Discord webhook URL not provided, alerts will not be sent");
            return Ok(None);
        };

        Ok(Some(Self {
            client: http_client()?,
            webhook_url,
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        }))
    }

    fn message<'a>(&'a self, alert: &'a AlertPayload) -> WebhookMessage<'a> {
        WebhookMessage {
            username: &self.username,
            avatar_url: self.avatar_url.as_deref(),
            embeds: vec![Embed {
                title: &alert.title,
                description: &alert.description,
                color: alert.colour,
                timestamp: Utc::now().to_rfc3339(),
            }],
        }
    }

    async fn post(&self, alert: &AlertPayload) -> Result<(), ClientError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.message(alert))
            .send()
            .await?;

        // Discord answers 204 No Content on success
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for DiscordClient {
    async fn send_alert(&self, alert: &AlertPayload) -> bool {
        match self.post(alert).await {
            Ok(()) => {
                info!("Discord alert sent: {}", alert.title);
                true
            }
            Err(e) => {
                error!("Failed to send Discord alert '{}': {}", alert.title, e);
                false
            }
        }
    }
}
