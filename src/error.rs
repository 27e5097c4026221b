use std::collections::BTreeMap;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `storygap`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum StoryGapError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── LLM / Provider ──────────────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Exercise pipeline ───────────────────────────────────────────────
    #[error("exercise: {0}")]
    Exercise(#[from] ExerciseError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── LLM / Provider errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model {model} request failed: {message}")]
    Request { model: String, message: String },

    #[error("model {model} not found")]
    ModelNotFound { model: String },

    #[error("model {model} returned an empty response")]
    EmptyResponse { model: String },

    #[error("no model produced output. Attempts:\n{}", attempts.join("\n"))]
    AllModelsFailed { attempts: Vec<String> },

    #[error("API key not set (set STORYGAP_API_KEY or api_key in config.toml)")]
    MissingApiKey,
}

impl LlmError {
    /// Not-found class errors move on to the next model without counting as a
    /// real failure.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelNotFound { .. })
    }
}

// ─── Exercise pipeline errors ───────────────────────────────────────────────

/// Caller-visible pipeline failures. Every variant maps to one wire error
/// code.
#[derive(Debug, Error)]
pub enum ExerciseError {
    #[error("wordSet must be a non-empty list")]
    InvalidInput,

    #[error("wordSet has no usable words or repeats a target")]
    InvalidWords,

    #[error("model output failed validation after {attempts} attempts: {reason}")]
    ModelOutputInvalid {
        reason: String,
        missing_words: Vec<String>,
        counts: BTreeMap<String, usize>,
        gap_count: usize,
        expected_count: usize,
        issues: Vec<String>,
        attempts: u32,
    },

    #[error("text generation failed after {attempts} attempts: {message}")]
    GenerationFailed { message: String, attempts: u32 },

    #[error("story gap generation failed: {0}")]
    Internal(String),
}

impl ExerciseError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidWords => "invalid_words",
            Self::ModelOutputInvalid { .. } => "model_output_invalid",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::Internal(_) => "story_gap_failed",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput | Self::InvalidWords => 400,
            Self::ModelOutputInvalid { .. } => 422,
            Self::GenerationFailed { .. } => 502,
            Self::Internal(_) => 500,
        }
    }

    /// A fresh pipeline run may succeed where this one did not.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelOutputInvalid { .. } | Self::GenerationFailed { .. }
        )
    }

    /// Wire payload: `{ error, message, retryable?, ...diagnostics }`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if self.retryable() {
            body["retryable"] = serde_json::Value::Bool(true);
        }
        match self {
            Self::ModelOutputInvalid {
                reason,
                missing_words,
                counts,
                gap_count,
                expected_count,
                issues,
                attempts,
            } => {
                body["reason"] = serde_json::json!(reason);
                body["missing_words"] = serde_json::json!(missing_words);
                body["counts"] = serde_json::json!(counts);
                body["gap_count"] = serde_json::json!(gap_count);
                body["expected_count"] = serde_json::json!(expected_count);
                if !issues.is_empty() {
                    body["issues"] = serde_json::json!(issues);
                }
                body["attempts"] = serde_json::json!(attempts);
            }
            Self::GenerationFailed { attempts, .. } => {
                body["attempts"] = serde_json::json!(attempts);
            }
            Self::InvalidInput | Self::InvalidWords | Self::Internal(_) => {}
        }
        body
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, StoryGapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = StoryGapError::Config(ConfigError::Validation("models is empty".into()));
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn all_models_failed_lists_attempts() {
        let err = LlmError::AllModelsFailed {
            attempts: vec!["gpt-4o: boom".into(), "gpt-4o-mini: bust".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("gpt-4o: boom"));
        assert!(msg.contains("gpt-4o-mini: bust"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: StoryGapError = anyhow_err.into();
        assert!(err.to_string().contains("something went wrong"));
    }

    #[test]
    fn input_errors_are_not_retryable() {
        assert_eq!(ExerciseError::InvalidInput.http_status(), 400);
        assert!(!ExerciseError::InvalidWords.retryable());
        let body = ExerciseError::InvalidInput.to_json();
        assert_eq!(body["error"], "invalid_input");
        assert!(body.get("retryable").is_none());
    }

    #[test]
    fn model_output_invalid_carries_diagnostics() {
        let err = ExerciseError::ModelOutputInvalid {
            reason: "must_be_once".into(),
            missing_words: vec!["owl".into()],
            counts: BTreeMap::from([("whale".into(), 2), ("owl".into(), 0)]),
            gap_count: 2,
            expected_count: 2,
            issues: Vec::new(),
            attempts: 3,
        };
        let body = err.to_json();
        assert_eq!(body["error"], "model_output_invalid");
        assert_eq!(body["retryable"], true);
        assert_eq!(body["missing_words"][0], "owl");
        assert_eq!(body["counts"]["whale"], 2);
        assert!(body.get("issues").is_none());
    }
}
