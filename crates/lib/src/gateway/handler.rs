//! Webhook handler: acknowledge, resolve the intent, reply once.
//!
//! Each update runs in its own session and task. Failures never escape: the platform was
//! already answered, so the only remaining channel is a best-effort apology to the chat.

use crate::channels::{ChatId, ChatNotifier, InboundUpdate, TelegramError};
use crate::nlu::{IntentResolver, NluError, SessionRef};
use std::sync::Arc;

/// Sent when the NLU service returns no fulfillment text.
pub const FALLBACK_REPLY: &str = "I'm sorry, I didn't understand that. Please try again.";

/// Sent once when resolving or replying fails.
pub const APOLOGY_REPLY: &str = "Oops! Something went wrong on my end. Please try again later.";

/// Terminal state of one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No message text; nothing was sent.
    Ignored,
    /// Fulfillment text was sent.
    Replied,
    /// The fallback reply was sent.
    FallbackReplied,
    /// Something failed and the apology was sent.
    Apologized,
    /// Something failed and no reply could be delivered.
    Dropped,
}

#[derive(Debug, thiserror::Error)]
enum RelayError {
    #[error("update has text but no usable chat id")]
    MissingChatId,
    #[error(transparent)]
    Resolve(#[from] NluError),
    #[error(transparent)]
    Notify(#[from] TelegramError),
}

/// Drives one inbound update through the resolver and the notifier.
pub struct WebhookHandler {
    resolver: Arc<dyn IntentResolver>,
    notifier: Arc<dyn ChatNotifier>,
    project_id: String,
    language_code: String,
}

impl WebhookHandler {
    pub fn new(
        resolver: Arc<dyn IntentResolver>,
        notifier: Arc<dyn ChatNotifier>,
        project_id: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            notifier,
            project_id: project_id.into(),
            language_code: language_code.into(),
        }
    }

    /// Handle one update. `ack` is called first, before anything else happens,
    /// and releases the platform-facing response.
    pub async fn handle_update<A>(&self, update: InboundUpdate, ack: A) -> Outcome
    where
        A: FnOnce(),
    {
        ack();
        // Let the woken response future run before this task starts downstream I/O.
        tokio::task::yield_now().await;

        let Some(text) = update.text() else {
            log::debug!(
                "update {:?}: no text message, ignoring",
                update.update_id()
            );
            return Outcome::Ignored;
        };

        match self.relay(&update, text).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("update {:?}: relay failed: {}", update.update_id(), e);
                self.apologize(&update).await
            }
        }
    }

    async fn relay(&self, update: &InboundUpdate, text: &str) -> Result<Outcome, RelayError> {
        let chat_id = update.chat_id().ok_or(RelayError::MissingChatId)?;
        let session = SessionRef::new(&self.project_id);
        log::info!("message from chat {}: {:?}", chat_id, text);
        log::debug!("dialogflow session: {}", session);

        let resolution = self
            .resolver
            .detect_intent(&session, text, &self.language_code)
            .await?;
        log::info!(
            "intent: {}",
            resolution.intent.as_deref().unwrap_or("no intent detected")
        );

        match resolution.fulfillment_text.as_deref() {
            Some(reply) if !reply.is_empty() => {
                self.notifier.send_message(&chat_id, reply).await?;
                log::info!("reply sent to chat {}", chat_id);
                Ok(Outcome::Replied)
            }
            _ => {
                log::info!("no fulfillment text, sending fallback to chat {}", chat_id);
                self.notifier.send_message(&chat_id, FALLBACK_REPLY).await?;
                Ok(Outcome::FallbackReplied)
            }
        }
    }

    /// One best-effort apology; its own failure is logged and discarded.
    async fn apologize(&self, update: &InboundUpdate) -> Outcome {
        let Some(chat_id) = update.chat_id() else {
            log::warn!(
                "update {:?}: failed without a chat id, dropping without reply",
                update.update_id()
            );
            return Outcome::Dropped;
        };
        self.send_apology(&chat_id).await
    }

    async fn send_apology(&self, chat_id: &ChatId) -> Outcome {
        match self.notifier.send_message(chat_id, APOLOGY_REPLY).await {
            Ok(()) => Outcome::Apologized,
            Err(e) => {
                log::error!("failed to send error message to chat {}: {}", chat_id, e);
                Outcome::Dropped
            }
        }
    }
}
