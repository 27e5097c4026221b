use super::traits::Provider;
use super::types::{ChatMessage, CompletionRequest, SamplingParams};
use crate::error::LlmError;
use std::sync::Arc;

/// Ordered model identifiers tried against one provider: primary first, then
/// cheaper or more available fallbacks.
///
/// There is no retry of the same model here. Looping across semantically
/// different attempts belongs to the caller.
#[derive(Clone)]
pub struct ModelChain {
    provider: Arc<dyn Provider>,
    models: Vec<String>,
}

impl ModelChain {
    pub fn new(provider: Arc<dyn Provider>, models: Vec<String>) -> Self {
        let models = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Self { provider, models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Returns the first non-empty response along the chain.
    ///
    /// Unavailable models and empty responses fall through to the next model.
    /// An error on the last model is terminal for this call.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<String, LlmError> {
        let mut failures = Vec::new();
        let last = self.models.len().saturating_sub(1);

        for (position, model) in self.models.iter().enumerate() {
            let request = CompletionRequest::new(model, messages, params);
            match self.provider.complete(&request).await {
                Ok(text) if !text.trim().is_empty() => {
                    if position > 0 {
                        tracing::info!(
                            provider = self.provider.name(),
                            model = model.as_str(),
                            "Fallback model produced output"
                        );
                    }
                    return Ok(text);
                }
                Ok(_) => {
                    tracing::warn!(model = model.as_str(), "Model returned empty response");
                    failures.push(LlmError::EmptyResponse {
                        model: model.clone(),
                    });
                }
                Err(e) if e.is_model_unavailable() => {
                    tracing::warn!(model = model.as_str(), "Model unavailable, skipping");
                    failures.push(e);
                }
                Err(e) if position == last => {
                    tracing::warn!(model = model.as_str(), error = %e, "Last model in chain failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        model = model.as_str(),
                        error = %e,
                        "Model call failed, switching to fallback model"
                    );
                    failures.push(e);
                }
            }
        }

        Err(LlmError::AllModelsFailed {
            attempts: failures.iter().map(ToString::to_string).collect(),
        })
    }
}
