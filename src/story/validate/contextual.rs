use super::ValidationResult;
use crate::story::text::{WordMatcher, contains_word, split_sentences, tokens};
use crate::story::types::{Exercise, WordSet};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Shorter components are determiners and prepositions.
const MIN_COMPONENT_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextualIssue {
    /// A component of one phrase leaks into the sentence of another.
    /// Sentence numbers are 1-based.
    PhraseOverlap {
        first: String,
        second: String,
        first_sentence: usize,
        second_sentence: usize,
    },
    IllogicalPattern { name: &'static str, sentence: usize },
    /// Reported by the ambiguity challenge for one blank.
    AmbiguousGap {
        index: usize,
        alternatives: Vec<String>,
        reason: String,
    },
}

impl ContextualIssue {
    pub fn is_phrase_overlap(&self) -> bool {
        matches!(self, Self::PhraseOverlap { .. })
    }
}

impl fmt::Display for ContextualIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhraseOverlap {
                first,
                second,
                first_sentence,
                second_sentence,
            } => write!(
                f,
                "Overlapping phrases \"{first}\" and \"{second}\" (sentences {first_sentence} and {second_sentence})"
            ),
            Self::IllogicalPattern { name, sentence } => {
                write!(f, "Illogical sentence {sentence}: {name}")
            }
            Self::AmbiguousGap {
                index,
                alternatives,
                reason,
            } => {
                write!(f, "Gap {index} is ambiguous")?;
                if !alternatives.is_empty() {
                    write!(f, " (also fits: {})", alternatives.join(", "))?;
                }
                if !reason.is_empty() {
                    write!(f, ": {reason}")?;
                }
                Ok(())
            }
        }
    }
}

type PatternCheck = fn(&str) -> bool;

/// Known red flags, evaluated per sentence of the solution.
const ILLOGICAL_PATTERNS: &[(&str, PatternCheck)] = &[
    ("heart used with a locomotion verb", heart_moves),
    ("malformed \"had ever been\" passive", had_ever_been_participle),
];

const LOCOMOTION_VERBS: &[&str] = &[
    "run", "runs", "ran", "running", "walk", "walks", "walked", "walking", "jump", "jumps",
    "jumped", "jumping", "climb", "climbs", "climbed", "climbing", "swim", "swims", "swam",
    "swimming", "hop", "hops", "hopped", "hopping", "march", "marched", "marching",
];

const HEART_COLLOCATIONS: &[&str] = &["heart rate", "heart beat", "heartbeat"];

fn heart_moves(sentence: &str) -> bool {
    let toks = tokens(sentence);
    toks.iter().any(|t| t == "heart")
        && toks.iter().any(|t| LOCOMOTION_VERBS.contains(&t.as_str()))
        && !HEART_COLLOCATIONS.iter().any(|c| contains_word(sentence, c))
}

#[allow(clippy::expect_used)]
static HAD_EVER_BEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhad\s+ever\s+been\s+\w+ed\b").expect("valid regex")
});

fn had_ever_been_participle(sentence: &str) -> bool {
    HAD_EVER_BEEN_RE.is_match(sentence)
}

/// Cross-sentence phrase leakage and the illogical-pattern catalogue.
pub fn check(exercise: &Exercise, words: &WordSet) -> ValidationResult {
    let sentences = split_sentences(&exercise.solution_text);
    let mut issues = phrase_overlaps(&sentences, words);
    issues.extend(illogical_patterns(&sentences));

    if issues.is_empty() {
        ValidationResult::Ok
    } else {
        ValidationResult::ContextualFailure { issues }
    }
}

fn components(phrase: &str) -> Vec<&str> {
    phrase
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| t.chars().count() >= MIN_COMPONENT_CHARS)
        .collect()
}

/// Index of the first sentence holding `phrase`.
fn sentence_of(sentences: &[&str], phrase: &str) -> Option<usize> {
    let matcher = WordMatcher::new(phrase)?;
    sentences.iter().position(|s| matcher.is_match(s))
}

fn leaks_into(phrase: &str, sentence: &str) -> bool {
    components(phrase)
        .into_iter()
        .any(|c| contains_word(sentence, c))
}

fn phrase_overlaps(sentences: &[&str], words: &WordSet) -> Vec<ContextualIssue> {
    let located: Vec<(&str, usize)> = words
        .phrases()
        .filter_map(|p| sentence_of(sentences, p).map(|idx| (p, idx)))
        .collect();

    let mut issues = Vec::new();
    for (i, &(first, sa)) in located.iter().enumerate() {
        for &(second, sb) in &located[i + 1..] {
            if sa == sb {
                continue;
            }
            if leaks_into(first, sentences[sb]) || leaks_into(second, sentences[sa]) {
                issues.push(ContextualIssue::PhraseOverlap {
                    first: first.to_string(),
                    second: second.to_string(),
                    first_sentence: sa + 1,
                    second_sentence: sb + 1,
                });
            }
        }
    }
    issues
}

fn illogical_patterns(sentences: &[&str]) -> Vec<ContextualIssue> {
    let mut issues = Vec::new();
    for (idx, sentence) in sentences.iter().copied().enumerate() {
        for &(name, matches) in ILLOGICAL_PATTERNS {
            if matches(sentence) {
                issues.push(ContextualIssue::IllogicalPattern {
                    name,
                    sentence: idx + 1,
                });
            }
        }
    }
    issues
}
