//! tgflow core library — Telegram webhook update model, Dialogflow client, and the
//! gateway that relays one to the other. Used by the `tgflow` CLI.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod nlu;
