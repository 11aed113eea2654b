//! Telegram Bot API client and the outbound messaging seam.

pub mod commands;

use crate::error::{BotError, Result};
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Outbound message delivery. Fallible per call; the fan-out isolates
/// failures per recipient.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, user_id: i64, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// Every Bot API response wraps its payload in this envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
}

impl TelegramClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Config(format!("Failed to build Telegram HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_base: format!("https://api.telegram.org/bot{}", token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// Calls a Bot API method and unwraps the `ok`/`description` envelope.
    /// The API reports its own errors with non-2xx statuses *and* a JSON
    /// body, so the envelope is decoded regardless of status.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.http.post(self.method_url(method)).json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.ok {
            return Err(BotError::TelegramApi(
                envelope
                    .description
                    .unwrap_or_else(|| format!("{} refused without a description", method)),
            ));
        }
        envelope
            .result
            .ok_or_else(|| BotError::TelegramApi(format!("{} returned no result", method)))
    }

    /// Long-polls for updates past `offset`. The HTTP timeout is stretched
    /// past the server-side poll timeout so the two do not race.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &json!({
                    "offset": offset,
                    "timeout": timeout_secs,
                    "allowed_updates": ["message"],
                }),
                Some(Duration::from_secs(timeout_secs + 10)),
            )
            .await?;
        if !updates.is_empty() {
            debug!("Received {} update(s)", updates.len());
        }
        Ok(updates)
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, user_id: i64, text: &str) -> Result<()> {
        self.call::<serde_json::Value>(
            "sendMessage",
            &json!({ "chat_id": user_id, "text": text }),
            None,
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn envelope_decodes_success_and_failure() {
        let ok: ApiEnvelope<Vec<Update>> = serde_json::from_str(
            r#"{"ok": true, "result": [{"update_id": 5, "message": {"text": "/help", "chat": {"id": 9}}}]}"#,
        )
        .unwrap();
        assert!(ok.ok);
        let updates = ok.result.unwrap();
        assert_eq!(updates[0].update_id, 5);
        assert_eq!(updates[0].message.as_ref().unwrap().chat.id, 9);

        let refused: ApiEnvelope<Vec<Update>> =
            serde_json::from_str(r#"{"ok": false, "description": "Unauthorized"}"#).unwrap();
        assert!(!refused.ok);
        assert_eq!(refused.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn non_text_messages_still_decode() {
        let update: Update =
            serde_json::from_str(r#"{"update_id": 1, "message": {"chat": {"id": 3}}}"#).unwrap();
        assert!(update.message.unwrap().text.is_none());
    }
}
