//! Advisory grammar lints over the solution text.
//!
//! Each lint is a pure predicate over one sentence; the linter runs them in
//! order and reports every hit with its 1-based sentence number.

use super::ValidationResult;
use crate::story::text::{WordMatcher, contains_word, count_occurrences, split_sentences, tokens};
use crate::story::types::{Exercise, WordSet};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarIssue {
    pub sentence_index: usize,
    pub rule: &'static str,
    pub reason: String,
}

impl fmt::Display for GrammarIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sentence {}: {}", self.sentence_index, self.reason)
    }
}

type Lint = fn(&str, &WordSet) -> Option<String>;

const LINT_RULES: &[(&str, Lint)] = &[
    ("modal_to", modal_followed_by_to),
    ("repeated_word", repeated_token),
    ("target_repeated", target_twice_in_sentence),
    ("passive_without_been", passive_without_been),
    ("noun_phrase_as_verb", noun_phrase_without_support),
    ("infinitive_not_licensed", infinitive_not_licensed),
    ("participle_without_auxiliary", participle_without_auxiliary),
];

#[allow(clippy::expect_used)]
static MODAL_TO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(can|could|will|would|shall|should|may|might|must)\s+to\s+[a-z]+")
        .expect("valid regex")
});

fn modal_followed_by_to(sentence: &str, _: &WordSet) -> Option<String> {
    MODAL_TO_RE
        .find(sentence)
        .map(|m| format!("modal verb followed by \"to\" in \"{}\"", m.as_str()))
}

/// Doubling is grammatical for these.
const DOUBLING_ALLOWED: &[&str] = &["had", "that"];

fn repeated_token(sentence: &str, _: &WordSet) -> Option<String> {
    tokens(sentence)
        .windows(2)
        .find(|pair| pair[0] == pair[1] && !DOUBLING_ALLOWED.contains(&pair[0].as_str()))
        .map(|pair| format!("repeated word \"{}\"", pair[0]))
}

fn target_twice_in_sentence(sentence: &str, words: &WordSet) -> Option<String> {
    words
        .iter()
        .find(|w| count_occurrences(sentence, w) > 1)
        .map(|w| format!("\"{w}\" appears more than once in one sentence"))
}

const PERFECT_AUXILIARIES: &[&str] = &["has", "have", "had"];
const PASSIVE_PREPOSITIONS: &[&str] = &["by", "from", "into", "to", "out"];
/// How far after the auxiliary a participle may sit (adverbs in between).
const PARTICIPLE_WINDOW: usize = 3;

const IRREGULAR_PARTICIPLES: &[&str] = &[
    "begun", "bitten", "blown", "broken", "brought", "built", "bought", "caught", "chosen",
    "done", "drawn", "driven", "eaten", "fallen", "forgotten", "found", "given", "gone", "grown",
    "hidden", "held", "kept", "known", "left", "lost", "made", "paid", "ridden", "seen", "sent",
    "shaken", "shown", "sold", "spoken", "stolen", "sung", "swum", "taken", "taught", "thrown",
    "told", "woken", "worn", "written",
];

fn is_participle(token: &str) -> bool {
    IRREGULAR_PARTICIPLES.contains(&token)
        || (token.len() > 3 && token.ends_with("ed") && token.chars().all(|c| c.is_ascii_lowercase()))
}

/// `had sent to her` style passives that drop "been".
fn passive_without_been(sentence: &str, _: &WordSet) -> Option<String> {
    let toks = tokens(sentence);
    for (i, tok) in toks.iter().enumerate() {
        if !PERFECT_AUXILIARIES.contains(&tok.as_str()) {
            continue;
        }
        let window_end = (i + 1 + PARTICIPLE_WINDOW).min(toks.len());
        for j in i + 1..window_end {
            if toks[j] == "been" {
                break;
            }
            if !is_participle(&toks[j]) {
                continue;
            }
            let next = toks.get(j + 1).map(String::as_str);
            let preposition = match next {
                Some("out") => toks.get(j + 2).is_some_and(|t| t == "of"),
                Some(p) => PASSIVE_PREPOSITIONS.contains(&p),
                None => false,
            };
            if preposition {
                return Some(format!("passive \"{tok} {}\" is missing \"been\"", toks[j]));
            }
            break;
        }
    }
    None
}

const NOUN_PHRASES: &[&str] = &[
    "a living", "a lie", "a meal", "a mistake", "a profit", "a snack", "a joke", "a story",
    "a decision", "a break",
];

const SUPPORT_VERBS: &[&str] = &[
    "earn", "earns", "earned", "earning", "get", "gets", "got", "gotten", "getting", "have", "has",
    "had", "having", "make", "makes", "made", "making", "eat", "eats", "ate", "eaten", "eating",
    "tell", "tells", "told", "telling",
];

fn noun_phrase_without_support(sentence: &str, words: &WordSet) -> Option<String> {
    let toks = tokens(sentence);
    if toks.iter().any(|t| SUPPORT_VERBS.contains(&t.as_str())) {
        return None;
    }
    words
        .iter()
        .filter(|w| NOUN_PHRASES.contains(&w.to_lowercase().as_str()))
        .find(|w| {
            WordMatcher::new(w)
                .and_then(|m| m.find_first(sentence))
                .is_some_and(|hit| followed_by_word(&sentence[hit.end..]))
        })
        .map(|w| format!("noun phrase \"{w}\" is used without a support verb"))
}

fn followed_by_word(rest: &str) -> bool {
    let trimmed = rest.trim_start();
    trimmed.len() < rest.len() && trimmed.chars().next().is_some_and(char::is_alphabetic)
}

const INFINITIVE_FRAMES: &[&str] = &[
    "want to", "wants to", "wanted to", "need to", "needs to", "needed to", "try to",
    "tries to", "tried to", "plan to", "plans to", "planned to", "hope to", "hopes to",
    "hoped to", "decide to", "decides to", "decided to", "learn to", "learns to", "learned to",
    "going to", "have to", "has to", "had to", "able to", "used to", "like to", "likes to",
    "love to", "loves to", "in order to",
];

fn infinitive_not_licensed(sentence: &str, words: &WordSet) -> Option<String> {
    let has_frame = || INFINITIVE_FRAMES.iter().any(|f| contains_word(sentence, f));
    words
        .iter()
        .filter(|w| w.to_lowercase().starts_with("to "))
        .find(|w| contains_word(sentence, w) && !has_frame())
        .map(|w| format!("infinitive \"{w}\" is not licensed by a verb like \"want to\""))
}

const PARTICIPLE_AUXILIARIES: &[&str] = &[
    "has", "have", "had", "was", "were", "is", "are", "be", "been", "being", "get", "got",
    "gotten",
];

fn participle_without_auxiliary(sentence: &str, words: &WordSet) -> Option<String> {
    let toks = tokens(sentence);
    if toks.iter().any(|t| PARTICIPLE_AUXILIARIES.contains(&t.as_str())) {
        return None;
    }
    words
        .iter()
        .filter(|w| !w.contains(char::is_whitespace) && is_participle(&w.to_lowercase()))
        .find(|w| contains_word(sentence, w))
        .map(|w| format!("participle \"{w}\" lacks an auxiliary"))
}

/// Runs every lint over every sentence of the solution.
pub fn lint(exercise: &Exercise, words: &WordSet) -> ValidationResult {
    let issues: Vec<GrammarIssue> = split_sentences(&exercise.solution_text)
        .into_iter()
        .enumerate()
        .flat_map(|(idx, sentence)| {
            LINT_RULES.iter().filter_map(move |&(rule, check)| {
                check(sentence, words).map(|reason| GrammarIssue {
                    sentence_index: idx + 1,
                    rule,
                    reason,
                })
            })
        })
        .collect();

    if issues.is_empty() {
        ValidationResult::Ok
    } else {
        ValidationResult::GrammarIssues { issues }
    }
}
