//! Chat-completion backend for OpenAI-compatible endpoints.
//!
//! One request shape: `{model, messages, max_tokens, n: 1, temperature}`,
//! one completion back, no streaming. HTTP 429 maps to the distinguished
//! rate-limit error; retry policy lives in the caller, not here.

use crate::models::{ApiError, BackendConfig, QagenError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    n: u32,
    temperature: f64,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
}

/// Seam between the rate-limited caller and the LLM backend.
///
/// The production implementation is [`ChatClient`]; tests substitute
/// scripted doubles.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one prompt, return the single completion's text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Reqwest-backed client for an OpenAI-compatible chat-completions API.
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(api_key: String, backend: &BackendConfig) -> Result<Self> {
        let timeout = Duration::from_secs(backend.timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(QagenError::Network)?;

        Ok(Self {
            client,
            api_key,
            base_url: backend.base_url.clone(),
            model: backend.model.clone(),
            max_tokens: backend.max_tokens,
            temperature: backend.temperature,
            timeout,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: self.max_tokens,
            n: 1,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QagenError::Timeout(self.timeout)
                } else {
                    QagenError::Network(e)
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(1.0);

            debug!(model = %self.model, retry_after_secs = retry_after, "Rate limited");
            return Err(QagenError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error = if status == 401 {
                ApiError::AuthenticationFailed
            } else if status == 404 {
                ApiError::ModelNotFound(self.model.clone())
            } else if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
                ApiError::Status {
                    status,
                    message: api_error.error.message,
                }
            } else {
                ApiError::Status {
                    status,
                    message: error_body,
                }
            };
            return Err(QagenError::Api(error));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| QagenError::ParseError(format!("Failed to parse response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                QagenError::Api(ApiError::InvalidResponse(
                    "No choices in response".to_string(),
                ))
            })
    }
}
