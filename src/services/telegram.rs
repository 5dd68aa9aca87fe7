// src/services/telegram.rs

//! Telegram delivery service.
//!
//! Sends and edits notification messages through the Telegram Bot API.
//! Operator messages (startup banner, cycle errors) go to a separate
//! admin chat so they never mix with stock alerts.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::TelegramConfig;

/// Opaque reference to a sent message, enough to edit it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    /// Telegram message id within the chat
    pub message_id: i64,
    /// Chat the message was sent to
    pub chat_id: String,
}

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a new alert message, returning a handle for later edits.
    async fn send(&self, text: &str) -> Result<MessageHandle>;

    /// Edit a previously sent message in place.
    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<()>;

    /// Send a message to the operator channel.
    async fn notify_operator(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    chat_id: String,
    admin_chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier for the official Telegram Bot API.
    pub fn new(client: reqwest::Client, token: &str, config: &TelegramConfig) -> Self {
        Self::with_api_base(
            client,
            format!("https://api.telegram.org/bot{token}"),
            config,
        )
    }

    /// Create a notifier against a custom API base URL (used in tests).
    pub fn with_api_base(
        client: reqwest::Client,
        api_base: String,
        config: &TelegramConfig,
    ) -> Self {
        Self {
            client,
            api_base,
            chat_id: config.chat_id.clone(),
            admin_chat_id: config.admin_chat_id.clone(),
        }
    }

    /// POST a Bot API method and parse the standard response envelope.
    ///
    /// Returns a plain message on failure so callers can classify it as a
    /// send or edit error.
    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> std::result::Result<ApiResponse, String> {
        let url = format!("{}/{}", self.api_base, method);
        let response: ApiResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("{method} request failed: {e}"))?
            .json()
            .await
            .map_err(|e| format!("{method} returned malformed response: {e}"))?;

        if !response.ok {
            let description = response
                .description
                .unwrap_or_else(|| "no description".to_string());
            return Err(format!("{method} failed: {description}"));
        }
        Ok(response)
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> Result<MessageHandle> {
        let response = self
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "Markdown",
                    "disable_web_page_preview": true,
                }),
            )
            .await
            .map_err(AppError::Send)?;

        let message_id = response
            .result
            .map(|m| m.message_id)
            .ok_or_else(|| AppError::send("sendMessage response missing result"))?;

        Ok(MessageHandle {
            message_id,
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<MessageHandle> {
        self.send_to(&self.chat_id, text).await
    }

    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<()> {
        self.call(
            "editMessageText",
            serde_json::json!({
                "chat_id": handle.chat_id,
                "message_id": handle.message_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }),
        )
        .await
        .map_err(AppError::Edit)?;
        Ok(())
    }

    async fn notify_operator(&self, text: &str) -> Result<()> {
        self.send_to(&self.admin_chat_id, text).await?;
        Ok(())
    }
}
