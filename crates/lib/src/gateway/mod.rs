//! Gateway: the Telegram webhook endpoint and the handler behind it.
//!
//! `POST /` acknowledges every update immediately, then the handler resolves the intent
//! and replies to the chat. `GET /` is a plaintext liveness check.

mod handler;
mod server;

pub use handler::{Outcome, WebhookHandler, APOLOGY_REPLY, FALLBACK_REPLY};
pub use server::{router, run_gateway, serve, GatewayState, LIVENESS_TEXT};
