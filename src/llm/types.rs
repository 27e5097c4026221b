use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Sampling knobs shared by every model in a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// One outbound oracle call against a single model identifier.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: &str, messages: &[ChatMessage], params: SamplingParams) -> Self {
        Self {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let msg = ChatMessage::system("be strict");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
    }

    #[test]
    fn completion_request_copies_params() {
        let params = SamplingParams {
            temperature: 0.4,
            max_output_tokens: 900,
        };
        let req = CompletionRequest::new("gpt-4o", &[ChatMessage::user("hi")], params);
        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.messages.len(), 1);
        assert!((req.temperature - 0.4).abs() < f64::EPSILON);
        assert_eq!(req.max_output_tokens, 900);
    }
}
