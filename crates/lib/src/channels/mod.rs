//! Messaging channel: the Telegram webhook update model and the outbound notifier.
//!
//! Inbound updates are parsed leniently; the gateway hands them to the webhook handler,
//! which replies through a [`ChatNotifier`].

mod notifier;
mod telegram;
mod update;

pub use notifier::ChatNotifier;
pub use telegram::{TelegramChannel, TelegramError};
pub use update::{ChatId, InboundUpdate};
