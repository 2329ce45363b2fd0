//! OAuth access tokens for the Dialogflow API.
//!
//! Service accounts authenticate with a self-signed RS256 JWT exchanged at the token endpoint
//! (JWT bearer grant). The resulting access token is reused until shortly before it expires.

use crate::config::ServiceAccountCredentials;
use crate::nlu::NluError;
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str =
    "https://www.googleapis.com/auth/cloud-platform https://www.googleapis.com/auth/dialogflow";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECS: i64 = 3600;
/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supplies bearer tokens for API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, NluError>;
}

/// Fixed token (emulators, tests).
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, NluError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Token source backed by a service account key.
pub struct ServiceAccountTokenSource {
    client_email: String,
    encoding_key: EncodingKey,
    token_uri: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    /// Parses the PEM key up front so bad credentials fail at startup, not on the first message.
    pub fn new(
        credentials: &ServiceAccountCredentials,
        token_uri: Option<String>,
    ) -> Result<Self, NluError> {
        let encoding_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| NluError::Auth(format!("invalid service account private key: {}", e)))?;
        Ok(Self {
            client_email: credentials.client_email.clone(),
            encoding_key,
            token_uri: token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    /// Signed JWT assertion for the bearer grant, issued at `now` (unix seconds).
    fn sign_assertion(&self, now: i64) -> Result<String, NluError> {
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: SCOPES.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| NluError::Auth(format!("signing assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<CachedToken, NluError> {
        let assertion = self.sign_assertion(chrono::Utc::now().timestamp())?;
        let res = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(NluError::Auth(format!("token exchange failed: {} {}", status, body)));
        }
        let data: TokenResponse = res
            .json()
            .await
            .map_err(|e| NluError::Auth(format!("token response: {}", e)))?;
        let lifetime = Duration::from_secs(data.expires_in.unwrap_or(ASSERTION_TTL_SECS as u64));
        log::debug!("dialogflow: fetched access token valid for {}s", lifetime.as_secs());
        Ok(CachedToken {
            access_token: data.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, NluError> {
        if let Some(ref token) = *self.cached.lock().await {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }
        // Not held across the exchange; a stalled fetch delays only its own caller.
        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *self.cached.lock().await = Some(token);
        Ok(access_token)
    }
}
