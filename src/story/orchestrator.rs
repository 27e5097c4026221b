//! The retry loop around the oracle.
//!
//! One request runs strictly sequentially: up to `1 + max_structural_retries`
//! generation attempts until an exercise passes the structural and contextual
//! gates, then at most one placeholder retry and one grammar retry. Both extra
//! retries are advisory and never turn a valid exercise into an error.

use super::challenge::{AmbiguityVerifier, ModelAmbiguityVerifier};
use super::client::GenerationClient;
use super::parser::normalize;
use super::prompt::{build_generation_prompt, sampling_params};
use super::request::StoryGapRequest;
use super::text::contains_placeholder;
use super::types::{Exercise, WordSet};
use super::validate::{self, GrammarIssue, StructuralReason, ValidationResult, grammar};
use crate::config::{Config, GenerationConfig};
use crate::error::ExerciseError;
use crate::llm::{ModelChain, OpenAiCompatibleProvider};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::Instrument;

const FINAL_RETRY_HINT: &str = "This is the last attempt. Keep it simple: write one short sentence of 5 to 8 words per target, \
     for example \"I saw a whale in the sea.\"";

const PHRASE_ISOLATION_HINT: &str = "Isolate every multi-word phrase: give each phrase its own self-contained sentence, and never \
     use any word of one phrase in the sentence written for another phrase.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_structural_retries: u32,
    pub grammar_retry: bool,
    pub placeholder_retry: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_structural_retries: 2,
            grammar_retry: true,
            placeholder_retry: true,
        }
    }
}

impl From<&GenerationConfig> for PipelineOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_structural_retries: config.max_structural_retries,
            grammar_retry: config.grammar_retry,
            placeholder_retry: config.placeholder_retry,
        }
    }
}

/// Why one generation attempt produced nothing usable.
#[derive(Debug, Clone)]
enum AttemptFailure {
    /// Transport or provider error, already scrubbed.
    Oracle(String),
    Unparseable,
    Invalid(ValidationResult),
}

impl AttemptFailure {
    fn reason(&self) -> &'static str {
        match self {
            Self::Oracle(_) => "generation_failed",
            Self::Unparseable => "unparseable_output",
            Self::Invalid(result) => result.reason(),
        }
    }
}

/// Loop state for one request. Transitions consume the old value.
#[derive(Debug, Clone, Default)]
struct RetrySession {
    /// Attempts made on the structural/contextual path.
    attempt: u32,
    /// Every generation call, including the advisory retries.
    calls: u32,
    feedback: Option<String>,
    last_failure: Option<AttemptFailure>,
}

impl RetrySession {
    fn failed(self, failure: AttemptFailure, feedback: Option<String>) -> Self {
        Self {
            attempt: self.attempt + 1,
            calls: self.calls + 1,
            feedback: feedback.or(self.feedback),
            last_failure: Some(failure),
        }
    }

    fn accepted(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            calls: self.calls + 1,
            ..self
        }
    }

    fn extra_call(self) -> Self {
        Self {
            calls: self.calls + 1,
            ..self
        }
    }
}

/// Builds cloze exercises from word sets. Cheap to share behind an `Arc`.
pub struct StoryGapPipeline {
    client: GenerationClient,
    options: PipelineOptions,
    verifier: Option<Arc<dyn AmbiguityVerifier>>,
}

impl StoryGapPipeline {
    pub fn new(client: GenerationClient, options: PipelineOptions) -> Self {
        Self {
            client,
            options,
            verifier: None,
        }
    }

    /// Runs the ambiguity challenge on every structurally valid attempt.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn AmbiguityVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Wires the OpenAI-compatible provider and model chain from config.
    pub fn from_config(config: &Config) -> Self {
        let provider = Arc::new(OpenAiCompatibleProvider::new(
            "openai-compatible",
            &config.base_url,
            config.api_key.as_deref(),
            config.generation.request_timeout_secs,
        ));
        let client = GenerationClient::new(ModelChain::new(provider, config.models.clone()));
        let pipeline = Self::new(client.clone(), PipelineOptions::from(&config.generation));
        if config.generation.ambiguity_check {
            pipeline.with_verifier(Arc::new(ModelAmbiguityVerifier::new(client)))
        } else {
            pipeline
        }
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    pub fn models(&self) -> &[String] {
        self.client.models()
    }

    /// Returns a structurally valid exercise or an actionable error.
    pub async fn run(&self, request: &StoryGapRequest) -> Result<Exercise, ExerciseError> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "story_gap",
            %request_id,
            words = request.words.len(),
            difficulty = %request.difficulty
        );
        self.run_session(request).instrument(span).await
    }

    async fn run_session(&self, request: &StoryGapRequest) -> Result<Exercise, ExerciseError> {
        let words = &request.words;
        let max_attempts = 1 + self.options.max_structural_retries;
        let mut session = RetrySession::default();

        let exercise = loop {
            let outcome = self.attempt(request, session.feedback.as_deref()).await;
            match outcome {
                Ok(exercise) => {
                    session = session.accepted();
                    tracing::info!(attempt = session.attempt, "accepted");
                    break exercise;
                }
                Err(failure) => {
                    let attempt = session.attempt + 1;
                    tracing::warn!(attempt, reason = failure.reason(), "attempt rejected");
                    let final_retry = attempt + 1 == max_attempts;
                    let feedback =
                        failure_feedback(&failure, words, final_retry, session.feedback.as_deref());
                    session = session.failed(failure, feedback);
                    if session.attempt >= max_attempts {
                        let err = terminal_error(&session, words);
                        tracing::error!(
                            attempts = session.attempt,
                            code = err.code(),
                            "retry budget exhausted"
                        );
                        return Err(err);
                    }
                }
            }
        };

        let (exercise, session) = self.placeholder_stage(request, exercise, session).await;
        let (exercise, session) = self.grammar_stage(request, exercise, session).await;
        tracing::info!(calls = session.calls, "story gap ready");
        Ok(exercise)
    }

    /// One generation call, parsed and run through the blocking gates.
    async fn attempt(
        &self,
        request: &StoryGapRequest,
        feedback: Option<&str>,
    ) -> Result<Exercise, AttemptFailure> {
        let prompt = build_generation_prompt(&request.words, request.difficulty, feedback);
        let raw = self
            .client
            .generate_prompt(&prompt, sampling_params(request.difficulty))
            .await
            .map_err(|e| AttemptFailure::Oracle(e.to_string()))?;
        tracing::debug!(raw = %raw, "oracle output");

        let exercise = normalize(&raw, &request.words).ok_or(AttemptFailure::Unparseable)?;
        match validate::validate_exercise(&exercise, &request.words) {
            ValidationResult::Ok => {}
            failure => return Err(AttemptFailure::Invalid(failure)),
        }
        self.challenge(&exercise, &request.words).await?;
        Ok(exercise)
    }

    async fn challenge(&self, exercise: &Exercise, words: &WordSet) -> Result<(), AttemptFailure> {
        let Some(verifier) = &self.verifier else {
            return Ok(());
        };
        match verifier.verify(words, exercise).await {
            Ok(report) if report.is_ambiguous() => {
                Err(AttemptFailure::Invalid(ValidationResult::ContextualFailure {
                    issues: report.into_issues(),
                }))
            }
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "ambiguity challenge unavailable; continuing");
                Ok(())
            }
        }
    }

    async fn placeholder_stage(
        &self,
        request: &StoryGapRequest,
        exercise: Exercise,
        session: RetrySession,
    ) -> (Exercise, RetrySession) {
        if !self.options.placeholder_retry || !has_placeholder(&exercise) {
            return (exercise, session);
        }
        tracing::info!("placeholder text detected; regenerating once");
        let feedback = placeholder_feedback(&request.words);
        let outcome = self.attempt(request, Some(&feedback)).await;
        let session = session.extra_call();
        match outcome {
            Ok(candidate) => {
                if has_placeholder(&candidate) {
                    tracing::warn!("placeholder persists after retry");
                }
                (candidate, session)
            }
            Err(failure) => {
                tracing::warn!(
                    reason = failure.reason(),
                    "placeholder retry failed; keeping previous exercise"
                );
                (exercise, session)
            }
        }
    }

    async fn grammar_stage(
        &self,
        request: &StoryGapRequest,
        exercise: Exercise,
        session: RetrySession,
    ) -> (Exercise, RetrySession) {
        if !self.options.grammar_retry {
            return (exercise, session);
        }
        let words = &request.words;
        let ValidationResult::GrammarIssues { issues } = grammar::lint(&exercise, words) else {
            return (exercise, session);
        };
        tracing::info!(issues = issues.len(), "grammar issues; regenerating once");
        let feedback = grammar_feedback(&exercise, &issues, words);
        let outcome = self.attempt(request, Some(&feedback)).await;
        let session = session.extra_call();
        match outcome {
            Ok(candidate) => {
                let remaining = grammar_issue_count(&grammar::lint(&candidate, words));
                let keeps_placeholder_free = !has_placeholder(&candidate) || has_placeholder(&exercise);
                if remaining < issues.len() && keeps_placeholder_free {
                    tracing::info!(before = issues.len(), after = remaining, "grammar retry adopted");
                    (candidate, session)
                } else {
                    tracing::info!(
                        before = issues.len(),
                        after = remaining,
                        "grammar retry did not improve; keeping original"
                    );
                    (exercise, session)
                }
            }
            Err(failure) => {
                tracing::warn!(
                    reason = failure.reason(),
                    "grammar retry failed; keeping original"
                );
                (exercise, session)
            }
        }
    }
}

fn has_placeholder(exercise: &Exercise) -> bool {
    contains_placeholder(&exercise.gap_text) || contains_placeholder(&exercise.solution_text)
}

fn grammar_issue_count(result: &ValidationResult) -> usize {
    match result {
        ValidationResult::GrammarIssues { issues } => issues.len(),
        _ => 0,
    }
}

fn quote_all(words: &[String]) -> String {
    words
        .iter()
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn closing_instructions(out: &mut String, words: &WordSet, final_retry: bool) {
    let _ = writeln!(
        out,
        "\nRewrite the whole story. Use each target exactly once, in its own sentence, in this order: {}.",
        quote_all(words.as_slice())
    );
    if final_retry {
        let _ = writeln!(out, "{FINAL_RETRY_HINT}");
    }
}

/// Corrective feedback for a rejected attempt.
pub fn synthesize_feedback(result: &ValidationResult, words: &WordSet, final_retry: bool) -> String {
    let mut out = format!("Your previous answer was rejected ({}).\n", result.reason());
    match result {
        ValidationResult::StructuralFailure(failure) => {
            let missing = failure.missing_words(words);
            if !missing.is_empty() {
                let _ = writeln!(out, "Missing words: {}.", quote_all(&missing));
            }
            let repeated = failure.duplicated_words(words);
            if !repeated.is_empty() {
                let _ = writeln!(out, "Used more than once: {}.", quote_all(&repeated));
            }
            if failure.reason == StructuralReason::GapCountMismatch {
                let _ = writeln!(
                    out,
                    "gap_text has {} blanks but needs exactly {}, one \"______\" per target.",
                    failure.gap_count, failure.expected_count
                );
            }
        }
        ValidationResult::ContextualFailure { issues } => {
            for issue in issues {
                let _ = writeln!(out, "- {issue}");
            }
            if issues.iter().any(|i| i.is_phrase_overlap()) {
                let _ = writeln!(out, "\n{PHRASE_ISOLATION_HINT}");
            }
        }
        ValidationResult::GrammarIssues { issues } => {
            for issue in issues {
                let _ = writeln!(out, "- {issue}");
            }
        }
        ValidationResult::Ok => {}
    }
    closing_instructions(&mut out, words, final_retry);
    out
}

/// Oracle errors carry no new information, so the previous feedback stays;
/// only the final retry gets the simplification hint appended to it.
fn failure_feedback(
    failure: &AttemptFailure,
    words: &WordSet,
    final_retry: bool,
    previous: Option<&str>,
) -> Option<String> {
    match failure {
        AttemptFailure::Oracle(_) if !final_retry => None,
        AttemptFailure::Oracle(_) => Some(match previous {
            Some(previous) => format!("{}\n{FINAL_RETRY_HINT}\n", previous.trim_end()),
            None => {
                let mut out = String::new();
                closing_instructions(&mut out, words, true);
                out.trim_start().to_string()
            }
        }),
        AttemptFailure::Unparseable => {
            let mut out = String::from(
                "Your previous reply was not a single JSON object in the required schema. \
                 Reply with the JSON object only, no prose and no code fences.\n",
            );
            closing_instructions(&mut out, words, final_retry);
            Some(out)
        }
        AttemptFailure::Invalid(result) => Some(synthesize_feedback(result, words, final_retry)),
    }
}

fn placeholder_feedback(words: &WordSet) -> String {
    let mut out = String::from(
        "Your previous answer used templated filler such as \"The word is ...\". \
         That is forbidden. Every sentence must be a natural part of the story and use its target in context.\n",
    );
    closing_instructions(&mut out, words, false);
    out
}

fn grammar_feedback(exercise: &Exercise, issues: &[GrammarIssue], words: &WordSet) -> String {
    let mut out = String::from("Your previous story was valid but has grammar problems:\n");
    for issue in issues {
        let _ = writeln!(out, "- {issue}");
    }
    let _ = writeln!(out, "\nPrevious story:\n{}", exercise.solution_text);
    closing_instructions(&mut out, words, false);
    out
}

fn issue_lines(result: &ValidationResult) -> Vec<String> {
    match result {
        ValidationResult::ContextualFailure { issues } => {
            issues.iter().map(ToString::to_string).collect()
        }
        ValidationResult::GrammarIssues { issues } => {
            issues.iter().map(ToString::to_string).collect()
        }
        ValidationResult::Ok | ValidationResult::StructuralFailure(_) => Vec::new(),
    }
}

/// Diagnostic error for an exhausted budget, derived from the last failure.
fn terminal_error(session: &RetrySession, words: &WordSet) -> ExerciseError {
    let attempts = session.attempt;
    let expected_count = words.len();
    match &session.last_failure {
        Some(AttemptFailure::Oracle(message)) => ExerciseError::GenerationFailed {
            message: message.clone(),
            attempts,
        },
        Some(AttemptFailure::Unparseable) => ExerciseError::ModelOutputInvalid {
            reason: "unparseable_output".into(),
            missing_words: Vec::new(),
            counts: BTreeMap::new(),
            gap_count: 0,
            expected_count,
            issues: Vec::new(),
            attempts,
        },
        Some(AttemptFailure::Invalid(ValidationResult::StructuralFailure(failure))) => {
            ExerciseError::ModelOutputInvalid {
                reason: failure.reason.as_str().into(),
                missing_words: failure.missing_words(words),
                counts: failure.counts.clone(),
                gap_count: failure.gap_count,
                expected_count: failure.expected_count,
                issues: Vec::new(),
                attempts,
            }
        }
        // Structure held, so every target occurred once.
        Some(AttemptFailure::Invalid(result)) => ExerciseError::ModelOutputInvalid {
            reason: result.reason().into(),
            missing_words: Vec::new(),
            counts: words.iter().map(|w| (w.clone(), 1)).collect(),
            gap_count: expected_count,
            expected_count,
            issues: issue_lines(result),
            attempts,
        },
        None => ExerciseError::Internal("retry budget exhausted without a recorded failure".into()),
    }
}
