pub mod contextual;
pub mod grammar;
pub mod structural;

pub use contextual::ContextualIssue;
pub use grammar::GrammarIssue;
pub use structural::{StructuralFailure, StructuralReason};

use super::types::{Exercise, WordSet};

/// Outcome of one validation pass. Consumed immediately by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Ok,
    StructuralFailure(StructuralFailure),
    ContextualFailure { issues: Vec<ContextualIssue> },
    GrammarIssues { issues: Vec<GrammarIssue> },
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Short machine-readable reason for logs and terminal diagnostics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::StructuralFailure(failure) => failure.reason.as_str(),
            Self::ContextualFailure { .. } => "contextual_issues",
            Self::GrammarIssues { .. } => "grammar_issues",
        }
    }
}

/// The blocking gate: structural first, contextual only once structure holds.
pub fn validate_exercise(exercise: &Exercise, words: &WordSet) -> ValidationResult {
    match structural::check(exercise, words) {
        ValidationResult::Ok => contextual::check(exercise, words),
        failure => failure,
    }
}
