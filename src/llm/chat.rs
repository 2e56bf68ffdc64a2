//! OpenAI-compatible chat completion client.
//!
//! Talks to any `/chat/completions` endpoint that follows the OpenAI wire
//! format. The defaults target Groq's hosted `llama-3.3-70b-versatile`.
//! Sampling temperature is always 0 so repeated drafts are as deterministic as
//! the provider allows.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LanguageModel, LlmError, LlmResult};

/// Default API base URL (Groq's OpenAI-compatible endpoint).
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Connection settings for [`ChatCompletionClient`].
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl ChatConfig {
    /// Settings for the default provider and model with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for a hosted chat model.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    config: ChatConfig,
}

impl ChatCompletionClient {
    /// Build a client.
    ///
    /// # Errors
    /// Returns `LlmError::Config` if the API key is blank or the HTTP client
    /// cannot be constructed
    pub fn new(mut config: ChatConfig) -> LlmResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("API key must not be empty".to_string()));
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            max_tokens: self.config.max_tokens,
        }
    }
}

/// Pull the first choice's text out of a chat response.
fn extract_content(response: ChatResponse) -> LlmResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("response contained no message content".to_string()))
}

#[async_trait]
impl LanguageModel for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!("Calling {} with a {}-byte prompt", self.config.model, prompt.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        extract_content(parsed)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_endpoint(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> ChatCompletionClient {
        let mut config = ChatConfig::new("test-key");
        config.base_url = base_url;
        config.timeout_secs = 5;
        ChatCompletionClient::new(config).unwrap()
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        assert!(matches!(
            ChatCompletionClient::new(ChatConfig::new("  ")),
            Err(LlmError::Config(_))
        ));
    }

    #[test]
    fn test_request_body_uses_zero_temperature() {
        let client = client_for("http://localhost/v1/".to_string());
        assert_eq!(client.config().base_url, "http://localhost/v1");

        let body = serde_json::to_value(client.request_body("prove it")).unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "prove it");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_extract_content_requires_a_choice() {
        let empty: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(extract_content(empty), Err(LlmError::InvalidResponse(_))));

        let ok: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"role": "assistant", "content": "YES"}}]}))
                .unwrap();
        assert_eq!(extract_content(ok).unwrap(), "YES");
    }

    #[tokio::test]
    async fn test_complete_against_local_endpoint() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer test-key")
                );
                let echoed = body["messages"][0]["content"].as_str().unwrap_or_default().to_uppercase();
                Json(json!({"choices": [{"message": {"role": "assistant", "content": echoed}}]}))
            }),
        );
        let base_url = spawn_endpoint(router).await;

        let client = client_for(base_url);
        assert_eq!(client.complete("yes").await.unwrap(), "YES");
    }

    #[tokio::test]
    async fn test_rate_limit_and_server_errors() {
        let router = Router::new()
            .route(
                "/limited/chat/completions",
                post(|| async { (AxumStatus::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/broken/chat/completions",
                post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let base_url = spawn_endpoint(router).await;

        let limited = client_for(format!("{}/limited", base_url));
        assert!(matches!(limited.complete("x").await, Err(LlmError::RateLimited(_))));

        let broken = client_for(format!("{}/broken", base_url));
        match broken.complete("x").await {
            Err(LlmError::Api { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = client_for("http://127.0.0.1:1".to_string());
        assert!(matches!(client.complete("x").await, Err(LlmError::Network(_))));
    }
}
