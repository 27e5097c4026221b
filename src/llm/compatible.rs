//! Generic OpenAI-compatible provider.
//! Most LLM APIs follow the same `/v1/chat/completions` format, so a single
//! implementation covers OpenAI itself and the usual gateways in front of it.

use super::scrub::sanitize_api_error;
use super::traits::{CompletionFuture, Provider};
use super::types::{ChatMessage, CompletionRequest};
use crate::error::LlmError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    /// Pre-computed chat completions URL (avoids `format!` per request).
    cached_chat_url: String,
    client: Client,
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let cached_chat_url = if base_url.ends_with("chat/completions") {
            base_url.clone()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            name: name.to_string(),
            base_url,
            cached_auth_header: api_key
                .filter(|k| !k.is_empty())
                .map(|k| format!("Bearer {k}")),
            cached_chat_url,
            client: build_client(timeout_secs),
        }
    }

    fn chat_completions_url(&self) -> &str {
        &self.cached_chat_url
    }

    async fn call_chat_completions(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let Some(auth) = &self.cached_auth_header else {
            return Err(LlmError::MissingApiKey);
        };

        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .client
            .post(self.chat_completions_url())
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request {
                model: request.model.clone(),
                message: sanitize_api_error(&e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            let sanitized = sanitize_api_error(&error);
            if status == StatusCode::NOT_FOUND || mentions_missing_model(&sanitized) {
                return Err(LlmError::ModelNotFound {
                    model: request.model.clone(),
                });
            }
            return Err(LlmError::Request {
                model: request.model.clone(),
                message: format!("{} API error ({status}): {sanitized}", self.name),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| LlmError::Request {
            model: request.model.clone(),
            message: format!("{} JSON decode failed: {e}", self.name),
        })?;

        if let Some(usage) = &chat.usage {
            tracing::debug!(
                model = request.model.as_str(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "oracle usage"
            );
        }

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

/// Some gateways answer 400 instead of 404 for an unknown model.
fn mentions_missing_model(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("model_not_found")
        || (lower.contains("model") && lower.contains("does not exist"))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(self.call_chat_completions(request))
    }
}
