//! Gateway HTTP server: webhook POST and liveness GET on the same path.

use crate::channels::{InboundUpdate, TelegramChannel};
use crate::config::{self, Config};
use crate::gateway::handler::WebhookHandler;
use crate::nlu::{DialogflowClient, ServiceAccountTokenSource};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;

/// Plaintext body of `GET /`.
pub const LIVENESS_TEXT: &str =
    "Bot server is running. Send a POST request to this endpoint from Telegram.";

const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Shared state for the gateway routes.
#[derive(Clone)]
pub struct GatewayState {
    pub handler: Arc<WebhookHandler>,
    /// When Some, webhook requests must carry a matching secret header.
    pub webhook_secret: Option<String>,
    /// Update tasks still in flight; awaited during graceful shutdown.
    pub update_tasks: TaskTracker,
}

impl GatewayState {
    pub fn new(handler: Arc<WebhookHandler>, webhook_secret: Option<String>) -> Self {
        Self {
            handler,
            webhook_secret,
            update_tasks: TaskTracker::new(),
        }
    }
}

/// Routes: `GET /` liveness, `POST /` Telegram webhook.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(liveness).post(telegram_webhook))
        .with_state(state)
}

/// Build the Telegram and Dialogflow clients from config and run the server on
/// config.server.bind:config.server.port until SIGINT/SIGTERM.
/// Registers the webhook when telegram.webhookUrl is set and removes it on shutdown.
pub async fn run_gateway(config: Config) -> Result<()> {
    let bot_token = config::resolve_telegram_token(&config)
        .context("telegram bot token not configured (set TELEGRAM_TOKEN or telegram.botToken)")?;
    let project_id = config::resolve_project_id(&config).context(
        "dialogflow project not configured (set DIALOGFLOW_PROJECT_ID or dialogflow.projectId)",
    )?;
    let credentials = config::resolve_credentials(&config).context(
        "dialogflow credentials not configured (set GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY)",
    )?;

    let tokens = ServiceAccountTokenSource::new(&credentials, config.dialogflow.token_uri.clone())
        .context("loading service account credentials")?;
    let resolver = Arc::new(DialogflowClient::new(
        Arc::new(tokens),
        config.dialogflow.api_base.clone(),
    ));
    let telegram = Arc::new(TelegramChannel::with_api_base(
        Some(bot_token),
        config.telegram.api_base.clone(),
    ));
    let handler = Arc::new(WebhookHandler::new(
        resolver,
        telegram.clone(),
        project_id.clone(),
        config.dialogflow.language_code.clone(),
    ));
    log::info!(
        "dialogflow project {} (language {})",
        project_id,
        config.dialogflow.language_code
    );

    let webhook_registered = match config.telegram.webhook_url.as_deref() {
        Some(url) => {
            let secret = config.telegram.webhook_secret.as_deref();
            match telegram.set_webhook(url, secret).await {
                Ok(()) => {
                    log::info!("telegram webhook registered: {}", url);
                    true
                }
                Err(e) => {
                    log::warn!("telegram set_webhook failed: {}", e);
                    false
                }
            }
        }
        None => false,
    };

    let state = GatewayState::new(handler, config.telegram.webhook_secret.clone());

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("bot is running on {}", bind_addr);

    let telegram_for_shutdown = webhook_registered.then_some(telegram);
    serve(listener, state, shutdown_signal(telegram_for_shutdown)).await
}

/// Serve the routes on `listener` until `shutdown` completes, then wait for every
/// in-flight update to finish its reply before returning.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let update_tasks = state.update_tasks.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server exited")?;

    update_tasks.close();
    if !update_tasks.is_empty() {
        log::info!("waiting for {} in-flight update(s)", update_tasks.len());
    }
    update_tasks.wait().await;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Removes the Telegram webhook if this process registered it.
async fn shutdown_signal(telegram_webhook: Option<Arc<TelegramChannel>>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");

    if let Some(t) = telegram_webhook {
        if let Err(e) = t.delete_webhook().await {
            log::debug!("telegram delete_webhook on shutdown: {}", e);
        }
    }
}

/// POST / — receives a Telegram update. Answers 200 as soon as the handler acknowledges,
/// while the same handler task goes on to resolve and reply.
async fn telegram_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(ref expected) = state.webhook_secret {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !secret_matches(provided, expected) {
            log::warn!("webhook request with missing or wrong secret token");
            return StatusCode::FORBIDDEN;
        }
    }

    let update = InboundUpdate::from_slice(&body);
    log::debug!("incoming update: {}", update.raw());

    let (ack_tx, ack_rx) = oneshot::channel::<()>();
    let handler = state.handler.clone();
    state.update_tasks.spawn(async move {
        let outcome = handler
            .handle_update(update, move || {
                let _ = ack_tx.send(());
            })
            .await;
        log::debug!("update finished: {:?}", outcome);
    });
    if ack_rx.await.is_err() {
        log::warn!("handler task ended before acknowledging");
    }
    StatusCode::OK
}

/// Constant-time comparison of the webhook secret header.
fn secret_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// GET / returns a fixed plaintext string (for manual reachability checks).
async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_matches_only_identical_tokens() {
        assert!(secret_matches("s3cret", "s3cret"));
        assert!(!secret_matches("s3cres", "s3cret"));
        assert!(!secret_matches("s3cret-longer", "s3cret"));
        assert!(!secret_matches("", "s3cret"));
    }
}
