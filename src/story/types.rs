use crate::error::ExerciseError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Upper bound on target words per exercise.
pub const MAX_WORDS: usize = 8;

/// Vocabulary/grammar complexity tier requested by the caller.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    #[default]
    Green,
    Yellow,
    Red,
}

impl Difficulty {
    /// Unknown or missing tiers fall back to the easiest one.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        raw.map(str::trim)
            .and_then(|s| Self::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// Ordered, immutable list of 1..=8 target words or phrases.
///
/// Order is significant: it fixes `used_words` and the `gaps_meta` indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WordSet(Vec<String>);

impl WordSet {
    /// Trims entries, drops blanks and keeps the first [`MAX_WORDS`].
    ///
    /// A case-insensitive repeat among the kept words is `invalid_words`: no
    /// story can use the same target exactly once in two sentences.
    pub fn new(words: Vec<String>) -> Result<Self, ExerciseError> {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .take(MAX_WORDS)
            .collect();
        if words.is_empty() {
            return Err(ExerciseError::InvalidWords);
        }
        let mut seen = HashSet::new();
        if !words.iter().all(|w| seen.insert(w.to_lowercase())) {
            return Err(ExerciseError::InvalidWords);
        }
        Ok(Self(words))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Targets made of two or more whitespace-separated tokens.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
            .filter(|w| w.split_whitespace().count() >= 2)
    }
}

impl<'a> IntoIterator for &'a WordSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A rejected alternative for one blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub word: String,
    pub reason: String,
}

/// Why one blank is believed to have a single answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapMeta {
    /// 1-based, in word order.
    pub index: usize,
    pub correct: String,
    pub why_unique: String,
    pub rejects: Vec<Reject>,
}

/// The canonical cloze exercise returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub gap_text: String,
    pub solution_text: String,
    pub used_words: Vec<String>,
    pub gaps_meta: Vec<GapMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}
