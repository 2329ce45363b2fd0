//! Natural-language understanding: intent detection against Dialogflow ES.
//!
//! Every query runs in a fresh, single-use session; nothing is carried between calls.

mod auth;
mod dialogflow;

pub use auth::{ServiceAccountTokenSource, StaticTokenSource, TokenSource};
pub use dialogflow::DialogflowClient;

use async_trait::async_trait;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("dialogflow request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("dialogflow api error: {0}")]
    Api(String),
    #[error("dialogflow auth error: {0}")]
    Auth(String),
    #[error("dialogflow response malformed: {0}")]
    Decode(String),
}

/// Disposable session reference: fixed project id plus a fresh random token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    project_id: String,
    session_id: String,
}

impl SessionRef {
    /// New session with a random UUID v4 token.
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Resource path, e.g. `projects/my-agent/agent/sessions/<uuid>`.
    pub fn path(&self) -> String {
        format!(
            "projects/{}/agent/sessions/{}",
            self.project_id, self.session_id
        )
    }
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Result of one intent detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub fulfillment_text: Option<String>,
    /// Display name of the matched intent.
    pub intent: Option<String>,
}

/// Maps free text to a reply. Implemented by [`DialogflowClient`]; tests use fakes.
#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn detect_intent(
        &self,
        session: &SessionRef,
        text: &str,
        language_code: &str,
    ) -> Result<Resolution, NluError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_path_has_project_and_token() {
        let s = SessionRef::new("agent-1");
        let path = s.path();
        assert!(path.starts_with("projects/agent-1/agent/sessions/"));
        assert_eq!(path.rsplit('/').next(), Some(s.session_id()));
        assert!(uuid::Uuid::parse_str(s.session_id()).is_ok());
    }

    #[test]
    fn sessions_are_never_reused() {
        let a = SessionRef::new("agent-1");
        let b = SessionRef::new("agent-1");
        assert_ne!(a, b);
        assert_eq!(a.project_id(), b.project_id());
    }
}
