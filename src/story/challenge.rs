//! Optional second opinion on blank uniqueness.
//!
//! A stricter reviewer prompt asks the oracle whether any blank admits more
//! than one answer. The orchestrator only consults it when configured to.

use super::client::GenerationClient;
use super::parser::parse_model_json;
use super::prompt::{challenge_sampling_params, challenge_system_prompt};
use super::types::{Exercise, WordSet};
use super::validate::ContextualIssue;
use crate::error::LlmError;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AmbiguousGap {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AmbiguityReport {
    #[serde(default = "default_ok")]
    pub ok: bool,
    #[serde(default)]
    pub ambiguous: Vec<AmbiguousGap>,
}

fn default_ok() -> bool {
    true
}

impl AmbiguityReport {
    pub fn passed() -> Self {
        Self {
            ok: true,
            ambiguous: Vec::new(),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ok || !self.ambiguous.is_empty()
    }

    /// Contextual issues for the retry feedback; empty when the report passed.
    pub fn into_issues(self) -> Vec<ContextualIssue> {
        if !self.is_ambiguous() {
            return Vec::new();
        }
        if self.ambiguous.is_empty() {
            return vec![ContextualIssue::AmbiguousGap {
                index: 0,
                alternatives: Vec::new(),
                reason: "the reviewer rejected the exercise without naming a gap".into(),
            }];
        }
        self.ambiguous
            .into_iter()
            .map(|gap| ContextualIssue::AmbiguousGap {
                index: gap.index,
                alternatives: gap.alternatives,
                reason: gap.reason,
            })
            .collect()
    }
}

pub type VerifyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AmbiguityReport, LlmError>> + Send + 'a>>;

/// Capability seam for the ambiguity challenge.
pub trait AmbiguityVerifier: Send + Sync {
    fn verify<'a>(&'a self, words: &'a WordSet, exercise: &'a Exercise) -> VerifyFuture<'a>;
}

/// Asks the configured models to attack each blank.
pub struct ModelAmbiguityVerifier {
    client: GenerationClient,
}

impl ModelAmbiguityVerifier {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }
}

fn challenge_payload(words: &WordSet, exercise: &Exercise) -> String {
    serde_json::json!({
        "wordSet": words,
        "gap_text": exercise.gap_text,
        "solution_text": exercise.solution_text,
    })
    .to_string()
}

/// Unreadable replies count as a pass; the challenge never blocks on noise.
fn parse_report(raw: &str) -> AmbiguityReport {
    let Some(map) = parse_model_json(raw) else {
        tracing::warn!("ambiguity challenge reply was not JSON; treating as pass");
        return AmbiguityReport::passed();
    };
    match serde_json::from_value(Value::Object(map)) {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "ambiguity challenge reply had an unexpected shape");
            AmbiguityReport::passed()
        }
    }
}

impl AmbiguityVerifier for ModelAmbiguityVerifier {
    fn verify<'a>(&'a self, words: &'a WordSet, exercise: &'a Exercise) -> VerifyFuture<'a> {
        Box::pin(async move {
            let raw = self
                .client
                .generate(
                    &challenge_system_prompt(words),
                    &challenge_payload(words, exercise),
                    None,
                    challenge_sampling_params(),
                )
                .await?;
            tracing::debug!(raw = %raw, "ambiguity challenge reply");
            Ok(parse_report(&raw))
        })
    }
}
