use super::types::{Difficulty, WordSet};
use crate::error::ExerciseError;
use serde_json::Value;

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryGapRequest {
    pub words: WordSet,
    pub difficulty: Difficulty,
}

impl StoryGapRequest {
    pub fn new(words: WordSet, difficulty: Difficulty) -> Self {
        Self { words, difficulty }
    }

    /// Shape-checks a raw request body `{ wordSet: [...], difficulty: "..." }`.
    ///
    /// Fails fast before any oracle call: `invalid_input` when `wordSet` is
    /// missing, not a list, or empty; `invalid_words` when nothing usable
    /// survives coercion or a target is repeated.
    pub fn from_payload(payload: &Value) -> Result<Self, ExerciseError> {
        let Some(raw_words) = payload.get("wordSet").and_then(Value::as_array) else {
            return Err(ExerciseError::InvalidInput);
        };
        if raw_words.is_empty() {
            return Err(ExerciseError::InvalidInput);
        }

        let words = WordSet::new(raw_words.iter().filter_map(coerce_word).collect())?;

        let difficulty = Difficulty::parse_lenient(payload.get("difficulty").and_then(Value::as_str));
        Ok(Self { words, difficulty })
    }
}

/// Scalar entries become strings; falsy and structured entries are dropped.
fn coerce_word(value: &Value) -> Option<String> {
    let word = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Number(_) | Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => {
            return None;
        }
    };
    (!word.is_empty()).then_some(word)
}
