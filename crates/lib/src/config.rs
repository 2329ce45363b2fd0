//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.tgflow/config.json`) and environment.
//! Credentials are normally supplied through the environment; the file is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Telegram bot settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Dialogflow agent and service account settings.
    #[serde(default)]
    pub dialogflow: DialogflowConfig,
}

/// Bind address and port for the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the webhook endpoint (default 3000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; Telegram must be able to reach it).
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    3000
}

fn default_server_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Telegram bot config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_TOKEN env when set.
    pub bot_token: Option<String>,
    /// When set, `serve` registers this URL with setWebhook on startup and removes it on shutdown.
    pub webhook_url: Option<String>,
    /// Optional secret for webhook verification (X-Telegram-Bot-Api-Secret-Token).
    pub webhook_secret: Option<String>,
    /// Bot API base URL (default https://api.telegram.org).
    pub api_base: Option<String>,
}

/// Dialogflow ES agent config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogflowConfig {
    /// GCP project that owns the agent. Overridden by DIALOGFLOW_PROJECT_ID env.
    pub project_id: Option<String>,
    /// Service account email. Overridden by GOOGLE_CLIENT_EMAIL env.
    pub client_email: Option<String>,
    /// Service account PEM private key. Overridden by GOOGLE_PRIVATE_KEY env. Literal `\n` sequences are accepted.
    pub private_key: Option<String>,
    /// Language tag sent with every query (default "en").
    #[serde(default = "default_language_code")]
    pub language_code: String,
    /// API base URL (default https://dialogflow.googleapis.com).
    pub api_base: Option<String>,
    /// OAuth token endpoint (default https://oauth2.googleapis.com/token).
    pub token_uri: Option<String>,
}

fn default_language_code() -> String {
    "en".to_string()
}

/// Service account credentials after env/config resolution.
#[derive(Clone)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Non-empty, trimmed value of an env var.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_value(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the Telegram bot token: env TELEGRAM_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    env_value("TELEGRAM_TOKEN").or_else(|| config_value(&config.telegram.bot_token))
}

/// Resolve the Dialogflow project id: env DIALOGFLOW_PROJECT_ID overrides config.
pub fn resolve_project_id(config: &Config) -> Option<String> {
    env_value("DIALOGFLOW_PROJECT_ID").or_else(|| config_value(&config.dialogflow.project_id))
}

/// Resolve service account credentials: GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY env override config.
/// Returns None unless both parts are present.
pub fn resolve_credentials(config: &Config) -> Option<ServiceAccountCredentials> {
    let client_email = env_value("GOOGLE_CLIENT_EMAIL")
        .or_else(|| config_value(&config.dialogflow.client_email))?;
    let private_key = env_value("GOOGLE_PRIVATE_KEY")
        .or_else(|| config_value(&config.dialogflow.private_key))?;
    Some(ServiceAccountCredentials {
        client_email,
        private_key: normalize_private_key(&private_key),
    })
}

/// Replace literal `\n` escape sequences with real newlines (keys pasted into env vars lose them).
pub fn normalize_private_key(key: &str) -> String {
    key.replace("\\n", "\n")
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TGFLOW_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".tgflow").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, TGFLOW_CONFIG_PATH, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
