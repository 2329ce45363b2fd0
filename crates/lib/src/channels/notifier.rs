//! Outbound seam: deliver a text message to a chat.

use crate::channels::telegram::TelegramError;
use crate::channels::update::ChatId;
use async_trait::async_trait;

/// Sends a text message to a chat. Implemented by [`crate::channels::TelegramChannel`]; tests use fakes.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), TelegramError>;
}
