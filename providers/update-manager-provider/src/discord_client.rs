use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use update_notification_common::{DeliveryError, NotificationMessage, NotificationSink};

use crate::error::UpdateManagerError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord webhook body
#[derive(Debug, Serialize)]
pub struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<DiscordEmbedField>,
    pub footer: DiscordEmbedFooter,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct DiscordEmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct DiscordEmbedFooter {
    pub text: String,
}

impl From<&NotificationMessage> for DiscordWebhookPayload {
    fn from(message: &NotificationMessage) -> Self {
        Self {
            content: message.content(),
            embeds: vec![DiscordEmbed {
                title: message.title.clone(),
                description: message.description.clone(),
                color: message.color,
                fields: message
                    .fields
                    .iter()
                    .map(|field| DiscordEmbedField {
                        name: field.name.clone(),
                        value: field.value.clone(),
                        inline: field.inline,
                    })
                    .collect(),
                footer: DiscordEmbedFooter {
                    text: message.footer_text.clone(),
                },
                timestamp: message.timestamp.to_rfc3339(),
            }],
        }
    }
}

/// Discord webhook client for sending notifications
pub struct DiscordWebhookClient {
    http_client: Client,
    webhook_url: String,
}

impl DiscordWebhookClient {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, UpdateManagerError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpdateManagerError::HttpClient(e.to_string()))?;

        Ok(Self {
            http_client,
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookClient {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        debug!(kind = %message.kind, message_id = %message.id, "Sending message to Discord webhook");

        let payload = DiscordWebhookPayload::from(message);
        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(kind = %message.kind, "Discord message sent successfully");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(status = status.as_u16(), "Discord webhook rejected message");

        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{format_restart_required, FormatContext};
    use chrono::Utc;

    #[test]
    fn test_payload_carries_mention_and_embed() {
        let ctx = FormatContext {
            mention_prefix: Some("<@&42>".to_string()),
            ..FormatContext::default()
        };
        let message = format_restart_required(&ctx, "AutoTK", Utc::now());

        let json = serde_json::to_value(DiscordWebhookPayload::from(&message)).unwrap();

        assert!(json["content"].as_str().unwrap().starts_with("<@&42> "));
        assert_eq!(json["embeds"][0]["title"], "⚠️ Restart Required");
        assert_eq!(json["embeds"][0]["color"], 0xffa500);
        assert_eq!(json["embeds"][0]["fields"][0]["name"], "Plugin");
        assert_eq!(json["embeds"][0]["fields"][0]["inline"], true);
    }

    #[test]
    fn test_payload_omits_content_without_mention() {
        let message = format_restart_required(&FormatContext::default(), "AutoTK", Utc::now());
        let json = serde_json::to_value(DiscordWebhookPayload::from(&message)).unwrap();

        assert!(json.get("content").is_none());
    }
}
