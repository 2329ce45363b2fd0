//! Telegram channel: sendMessage, setWebhook and deleteWebhook via Bot API.

use crate::channels::notifier::ChatNotifier;
use crate::channels::update::ChatId;
use async_trait::async_trait;
use serde::Deserialize;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telegram api error: {0}")]
    Api(String),
    #[error("telegram bot token not configured")]
    MissingToken,
}

/// Bot API envelope; only `ok` and `description` are read.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API client used to answer chats and manage the webhook registration.
pub struct TelegramChannel {
    token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// `api_base` overrides the public Bot API URL (local Bot API server, tests).
    pub fn with_api_base(token: Option<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        Self {
            token,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> Result<String, TelegramError> {
        let token = self.token.as_ref().ok_or(TelegramError::MissingToken)?;
        Ok(format!("{}/bot{}/{}", self.api_base, token, method))
    }

    /// POST a Bot API method and check both the HTTP status and the `ok` flag.
    async fn call(&self, method: &str, body: &serde_json::Value) -> Result<(), TelegramError> {
        let url = self.method_url(method)?;
        let res = self.client.post(&url).json(body).send().await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(TelegramError::Api(format!("{} failed: {} {}", method, status, text)));
        }
        match serde_json::from_str::<ApiResponse>(&text) {
            Ok(r) if r.ok => Ok(()),
            Ok(r) => Err(TelegramError::Api(format!(
                "{} returned ok: false ({})",
                method,
                r.description.unwrap_or_default()
            ))),
            Err(e) => Err(TelegramError::Api(format!("{} returned unexpected body: {}", method, e))),
        }
    }

    /// Set webhook URL (and optional secret). Telegram then POSTs updates to the URL.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), TelegramError> {
        let mut body = serde_json::json!({ "url": url });
        if let Some(s) = secret {
            body["secret_token"] = serde_json::Value::String(s.to_string());
        }
        self.call("setWebhook", &body).await
    }

    /// Remove the webhook registration.
    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        self.call("deleteWebhook", &serde_json::json!({})).await
    }

    /// Send a text message to a chat via sendMessage API.
    pub async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), TelegramError> {
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        self.call("sendMessage", &body).await
    }
}

#[async_trait]
impl ChatNotifier for TelegramChannel {
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), TelegramError> {
        TelegramChannel::send_message(self, chat_id, text).await
    }
}
