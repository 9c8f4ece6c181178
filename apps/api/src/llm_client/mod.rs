/// LLM Client: the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the AI provider directly.
/// All LLM interactions MUST go through this module.
///
/// Speaks the OpenAI-style chat-completion protocol (OpenRouter by default).
/// Calls are never retried: a request either completes, times out, or fails.
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod prompts;

/// Fixed upstream timeout for report generation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 2000;
const APP_TITLE: &str = "Canada SaaS Immigration Advisor";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request to the AI provider timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid JSON response from the AI provider: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected response format from the AI provider: {0}")]
    MissingContent(&'static str),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Http(err)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// The single LLM client used by the report generator.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self::with_timeout(api_key, model, base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            model,
            base_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system + user exchange and returns the completion text.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .header("X-Title", APP_TITLE)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: upstream_error_message(&body),
            });
        }

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)?;

        if let Some(usage) = payload.get("usage") {
            debug!("LLM call succeeded: model={}, usage={usage}", self.model);
        }

        extract_content(&payload)
    }
}

/// Locates the completion text in a chat-completion payload.
///
/// Providers disagree on shape, so the first choice is read in order:
/// `message.content`, `message.delta.content`, `text`, `delta.content`.
pub fn extract_content(payload: &Value) -> Result<String, LlmError> {
    let choice = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(LlmError::MissingContent("no choices in response"))?;

    let content = if let Some(message) = choice.get("message") {
        message
            .get("content")
            .or_else(|| message.get("delta").and_then(|d| d.get("content")))
            .ok_or(LlmError::MissingContent("no content in response message"))?
    } else if let Some(text) = choice.get("text") {
        text
    } else if let Some(content) = choice.get("delta").and_then(|d| d.get("content")) {
        content
    } else {
        return Err(LlmError::MissingContent("unrecognized choice shape"));
    };

    match content.as_str() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(LlmError::EmptyContent),
    }
}

/// Pulls `error.message` out of an error body when present.
fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    #[test]
    fn test_extract_standard_message_content() {
        let payload = json!({"choices": [{"message": {"role": "assistant", "content": "# Report"}}]});
        assert_eq!(extract_content(&payload).unwrap(), "# Report");
    }

    #[test]
    fn test_extract_falls_back_through_shapes() {
        let delta_in_message = json!({"choices": [{"message": {"delta": {"content": "a"}}}]});
        assert_eq!(extract_content(&delta_in_message).unwrap(), "a");

        let text = json!({"choices": [{"text": "b"}]});
        assert_eq!(extract_content(&text).unwrap(), "b");

        let delta = json!({"choices": [{"delta": {"content": "c"}}]});
        assert_eq!(extract_content(&delta).unwrap(), "c");
    }

    #[test]
    fn test_extract_rejects_missing_and_blank_content() {
        assert!(matches!(
            extract_content(&json!({"choices": []})),
            Err(LlmError::MissingContent(_))
        ));
        assert!(matches!(
            extract_content(&json!({"choices": [{"message": {"role": "assistant"}}]})),
            Err(LlmError::MissingContent(_))
        ));
        assert!(matches!(
            extract_content(&json!({"choices": [{"message": {"content": "   \n"}}]})),
            Err(LlmError::EmptyContent)
        ));
        assert!(matches!(
            extract_content(&json!({"choices": [{"message": {"content": null}}]})),
            Err(LlmError::EmptyContent)
        ));
    }

    #[test]
    fn test_upstream_error_message_prefers_json_message() {
        assert_eq!(
            upstream_error_message(r#"{"error": {"message": "invalid key"}}"#),
            "invalid key"
        );
        assert_eq!(upstream_error_message("Bad Gateway"), "Bad Gateway");
    }

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/chat/completions")
    }

    #[tokio::test]
    async fn test_complete_sends_chat_payload_and_returns_text() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["role"], "user");
                assert_eq!(body["max_tokens"], 2000);
                Json(json!({"choices": [{"message": {"content": "generated"}}]}))
            }),
        );
        let url = spawn_upstream(router).await;
        let client = LlmClient::new("key".into(), "test-model".into(), url);

        let text = client.complete("system", "prompt").await.unwrap();
        assert_eq!(text, "generated");
    }

    #[tokio::test]
    async fn test_complete_maps_non_success_status_to_api_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"message": "rate limited"}})),
                )
            }),
        );
        let url = spawn_upstream(router).await;
        let client = LlmClient::new("key".into(), "m".into(), url);

        match client.complete("s", "p").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"choices": [{"text": "late"}]}))
            }),
        );
        let url = spawn_upstream(router).await;
        let client =
            LlmClient::with_timeout("key".into(), "m".into(), url, Duration::from_millis(100));

        assert!(matches!(
            client.complete("s", "p").await,
            Err(LlmError::Timeout)
        ));
    }

    #[test]
    fn test_unconfigured_client() {
        let client = LlmClient::new("  ".into(), "m".into(), "http://localhost".into());
        assert!(!client.is_configured());
    }
}
