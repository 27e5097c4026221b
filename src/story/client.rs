use super::prompt::Prompt;
use crate::error::LlmError;
use crate::llm::{ChatMessage, ModelChain, SamplingParams};

/// Oracle access for the pipeline. One `generate` is one logical attempt;
/// the only fallback inside it is the model chain.
#[derive(Clone)]
pub struct GenerationClient {
    chain: ModelChain,
}

impl GenerationClient {
    pub fn new(chain: ModelChain) -> Self {
        Self { chain }
    }

    pub fn models(&self) -> &[String] {
        self.chain.models()
    }

    /// Messages are `[system, user, feedback?]`; feedback rides as a second
    /// user turn so the payload stays machine-readable.
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_payload: &str,
        feedback: Option<&str>,
        params: SamplingParams,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(3);
        messages.push(ChatMessage::system(system_prompt));
        messages.push(ChatMessage::user(user_payload));
        if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
            messages.push(ChatMessage::user(feedback));
        }
        self.chain.complete(&messages, params).await
    }

    pub async fn generate_prompt(
        &self,
        prompt: &Prompt,
        params: SamplingParams,
    ) -> Result<String, LlmError> {
        self.generate(
            &prompt.system,
            &prompt.user,
            prompt.feedback.as_deref(),
            params,
        )
        .await
    }
}
