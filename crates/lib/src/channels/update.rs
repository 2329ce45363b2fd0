//! Inbound Telegram update (webhook POST body).
//!
//! Only `message.chat.id` and `message.text` are interpreted. The body may be anything;
//! parsing never fails, missing or wrongly typed fields simply read as absent.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Telegram chat identifier: numeric id, or `@channelusername` for channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Id(id) => write!(f, "{}", id),
            ChatId::Username(name) => f.write_str(name),
        }
    }
}

/// One webhook update as received; consumed once by the handler.
#[derive(Debug, Clone, Default)]
pub struct InboundUpdate {
    raw: Value,
}

impl InboundUpdate {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Parse a request body. Invalid JSON yields an empty update.
    pub fn from_slice(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(raw) => Self { raw },
            Err(e) => {
                log::debug!("webhook body is not valid JSON: {}", e);
                Self::default()
            }
        }
    }

    pub fn update_id(&self) -> Option<i64> {
        self.raw.get("update_id").and_then(Value::as_i64)
    }

    /// `message.text` when it is a non-empty string.
    pub fn text(&self) -> Option<&str> {
        self.raw
            .pointer("/message/text")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// `message.chat.id` when it is a non-zero integer or a non-empty string.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self.raw.pointer("/message/chat/id")? {
            Value::Number(n) => n.as_i64().filter(|id| *id != 0).map(ChatId::Id),
            Value::String(s) if !s.trim().is_empty() => Some(ChatId::Username(s.trim().to_string())),
            _ => None,
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}
