//! Dialogflow ES REST client (https://dialogflow.googleapis.com by default).
//! Only `sessions.detectIntent` with a text query is used.

use crate::nlu::{IntentResolver, NluError, Resolution, SessionRef, TokenSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://dialogflow.googleapis.com";

/// Client for the Dialogflow v2 API.
#[derive(Clone)]
pub struct DialogflowClient {
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
}

impl DialogflowClient {
    pub fn new(tokens: Arc<dyn TokenSource>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            tokens,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
}

#[derive(Debug, Serialize)]
struct QueryInput<'a> {
    text: TextInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    fulfillment_text: Option<String>,
    #[serde(default)]
    intent: Option<Intent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Intent {
    #[serde(default)]
    display_name: Option<String>,
}

#[async_trait]
impl IntentResolver for DialogflowClient {
    /// POST /v2/{session}:detectIntent
    async fn detect_intent(
        &self,
        session: &SessionRef,
        text: &str,
        language_code: &str,
    ) -> Result<Resolution, NluError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/v2/{}:detectIntent", self.base_url, session.path());
        let body = DetectIntentRequest {
            query_input: QueryInput {
                text: TextInput {
                    text,
                    language_code,
                },
            },
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(NluError::Api(format!("{} {}", status, body)));
        }
        let data: DetectIntentResponse = res
            .json()
            .await
            .map_err(|e| NluError::Decode(e.to_string()))?;
        let result = data
            .query_result
            .ok_or_else(|| NluError::Decode("missing queryResult".to_string()))?;
        Ok(Resolution {
            fulfillment_text: result.fulfillment_text,
            intent: result.intent.and_then(|i| i.display_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::StaticTokenSource;
    use mockito::Matcher;
    use serde_json::json;

    fn client(url: String) -> DialogflowClient {
        DialogflowClient::new(Arc::new(StaticTokenSource::new("ya29.test")), Some(url))
    }

    #[tokio::test]
    async fn detect_intent_sends_text_query_and_reads_result() {
        let mut server = mockito::Server::new_async().await;
        let session = SessionRef::new("agent-1");
        let path = format!("/v2/{}:detectIntent", session.path());
        let mock = server
            .mock("POST", path.as_str())
            .match_header("authorization", "Bearer ya29.test")
            .match_body(Matcher::Json(json!({
                "queryInput": { "text": { "text": "hello", "languageCode": "en" } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "responseId": "r-1",
                    "queryResult": {
                        "queryText": "hello",
                        "fulfillmentText": "Hi there!",
                        "intent": { "name": "projects/agent-1/agent/intents/1", "displayName": "Default Welcome Intent" }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let resolution = client(server.url())
            .detect_intent(&session, "hello", "en")
            .await
            .unwrap();
        assert_eq!(resolution.fulfillment_text.as_deref(), Some("Hi there!"));
        assert_eq!(resolution.intent.as_deref(), Some("Default Welcome Intent"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_fulfillment_and_intent_are_none() {
        let mut server = mockito::Server::new_async().await;
        let session = SessionRef::new("agent-1");
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"queryResult":{"queryText":"xyzzy"}}"#)
            .create_async()
            .await;

        let resolution = client(server.url())
            .detect_intent(&session, "xyzzy", "en")
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::default());
    }

    #[tokio::test]
    async fn missing_query_result_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"responseId":"r-1"}"#)
            .create_async()
            .await;

        let err = client(server.url())
            .detect_intent(&SessionRef::new("agent-1"), "hi", "en")
            .await
            .unwrap_err();
        assert!(matches!(err, NluError::Decode(_)));
    }

    #[tokio::test]
    async fn api_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"status":"PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let err = client(server.url())
            .detect_intent(&SessionRef::new("agent-1"), "hi", "en")
            .await
            .unwrap_err();
        assert!(matches!(err, NluError::Api(_)));
        assert!(err.to_string().contains("PERMISSION_DENIED"));
    }
}
