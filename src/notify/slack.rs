use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::services::SlackConfig;
use crate::error::TokenError;

const ERROR_BAD_RESPONSE: &str = "API call gave an other-than-200 result";
const ERROR_EMPTY_TEXT: &str = "Refusing to send an empty message";

/// Operational alert sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), TokenError>;
}

/// Webhook message; everything except `text` falls back to the webhook defaults.
#[derive(Debug, Serialize)]
struct Payload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    config: SlackConfig,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig, timeout: Duration) -> Result<Self, TokenError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send_text(&self, text: &str) -> Result<(), TokenError> {
        if text.is_empty() {
            return Err(TokenError::Notify(ERROR_EMPTY_TEXT.to_owned()));
        }
        let payload = serde_json::to_string(&Payload {
            text,
            channel: self.config.channel.as_deref(),
            username: self.config.username.as_deref(),
            icon_emoji: self.config.icon_emoji.as_deref(),
        })?;

        let response = self
            .client
            .post(&self.config.webhook_url)
            .form(&[("payload", payload.as_str())])
            .send()
            .await
            .map_err(|e| TokenError::Notify(e.to_string()))?;

        debug!(status = %response.status(), "slack webhook answered");
        if response.status() != StatusCode::OK {
            return Err(TokenError::Notify(ERROR_BAD_RESPONSE.to_owned()));
        }
        Ok(())
    }
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_text(&self, text: &str) -> Result<(), TokenError> {
        debug!(text, "alert dropped, no notifier configured");
        Ok(())
    }
}
