//! Thin client for the Telegram-style Bot API HTTP surface.
//!
//! Only the handful of methods courier actually calls. Request bodies are
//! built with `serde_json::json!`; higher layers own message copy and
//! keyboard structure, which travel through here as opaque JSON.

pub mod error;

pub use error::{BotApiError, Result};

use std::time::Duration;

use serde::Deserialize;

pub struct BotApiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl BotApiClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Send a text message, optionally with a reply/inline keyboard.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call("sendMessage", body).await
    }

    /// Send a previously-uploaded photo by file reference.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        file_ref: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "photo": file_ref,
        });
        if let Some(caption) = caption {
            body["caption"] = serde_json::Value::String(caption.to_string());
        }
        self.call("sendPhoto", body).await
    }

    /// Send a previously-uploaded document by file reference.
    pub async fn send_document(
        &self,
        chat_id: i64,
        file_ref: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "document": file_ref,
        });
        if let Some(caption) = caption {
            body["caption"] = serde_json::Value::String(caption.to_string());
        }
        self.call("sendDocument", body).await
    }

    /// Acknowledge a callback query so the client stops showing a spinner.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        self.call(
            "answerCallbackQuery",
            serde_json::json!({ "callback_query_id": callback_query_id }),
        )
        .await
    }

    /// Point the Bot API at our webhook endpoint, dropping queued updates.
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        self.call(
            "setWebhook",
            serde_json::json!({ "url": url, "drop_pending_updates": true }),
        )
        .await
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<()> {
        let endpoint = format!("{}/bot{}/{}", self.base_url, self.token, method);

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BotApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // The API reports some failures with HTTP 200 + ok=false.
        let envelope: ApiEnvelope = resp.json().await?;
        if !envelope.ok {
            return Err(BotApiError::Api {
                status: status.as_u16(),
                message: envelope.description.unwrap_or_default(),
            });
        }

        Ok(())
    }
}
