//! System prompts and sampling parameters for the oracle.
//!
//! Everything here is a pure function of the word set, the difficulty tier
//! and optional corrective feedback.

use super::text::BLANK;
use super::types::{Difficulty, WordSet};
use crate::llm::SamplingParams;
use std::fmt::Write;

/// JSON shape the oracle must answer with.
pub const OUTPUT_SCHEMA: &str = r#"{
  "gap_text": "<story with each target replaced by ______>",
  "solution_text": "<the same story fully written>",
  "used_words": ["<target 1>", "<target 2>"],
  "gaps_meta": [
    {
      "index": 1,
      "correct": "<target 1>",
      "why_unique": "<which context cue makes only this word fit>",
      "rejects": [{"word": "<plausible alternative>", "reason": "<why it does not fit>"}]
    }
  ],
  "notes": ["<optional remarks>"]
}"#;

/// One fully assembled oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub feedback: Option<String>,
}

/// Register instruction for a tier, expressed as a CEFR-like band.
pub fn register_instruction(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Green => {
            "Level: CEFR A2. Write short, concrete sentences of 8-12 words with everyday vocabulary. \
             Use present simple, present continuous or past simple only."
        }
        Difficulty::Yellow => {
            "Level: CEFR B1. Write sentences of 10-16 words. Everyday and some topic-specific \
             vocabulary is fine, and one subordinate clause per sentence is allowed."
        }
        Difficulty::Red => {
            "Level: CEFR B2-C1. Write sentences of 14-22 words with precise, varied vocabulary, \
             mixed tenses and richer clause structure, while staying natural."
        }
    }
}

/// Harder tiers sample colder and get a larger output budget.
pub fn sampling_params(difficulty: Difficulty) -> SamplingParams {
    match difficulty {
        Difficulty::Green | Difficulty::Yellow => SamplingParams {
            temperature: 0.9,
            max_output_tokens: 1200,
        },
        Difficulty::Red => SamplingParams {
            temperature: 0.6,
            max_output_tokens: 2000,
        },
    }
}

/// Sampling for the ambiguity challenge: deterministic and short.
pub fn challenge_sampling_params() -> SamplingParams {
    SamplingParams {
        temperature: 0.1,
        max_output_tokens: 800,
    }
}

fn quoted_list(words: &WordSet) -> String {
    words
        .iter()
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The invariant contract shared by both system prompts.
pub fn hard_constraints(words: &WordSet) -> String {
    let n = words.len();
    let mut out = String::from("HARD CONSTRAINTS (an answer that breaks any of them is rejected):\n");
    let _ = writeln!(
        out,
        "1. Write exactly {n} independent sentences, one per target, in the order given: {}.",
        quoted_list(words)
    );
    let _ = writeln!(
        out,
        "2. Each target appears exactly once in the whole story, in its own sentence, never in any other sentence."
    );
    let _ = writeln!(
        out,
        "3. Use the exact surface form of each target. Do not inflect, pluralise, or change its spelling."
    );
    let _ = writeln!(
        out,
        "4. In gap_text replace each target with {BLANK} (six underscores), giving exactly {n} blanks."
    );

    let phrases: Vec<&str> = words.phrases().collect();
    if !phrases.is_empty() {
        let _ = writeln!(
            out,
            "5. Multi-word targets ({}) are self-contained: no word of one phrase may appear in the sentence written for another target.",
            phrases
                .iter()
                .map(|p| format!("\"{p}\""))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let _ = writeln!(
        out,
        "Each sentence must give a context cue strong enough that only its target fits the blank."
    );
    let _ = writeln!(
        out,
        "Answer with ONE JSON object and nothing else, using this schema:\n{OUTPUT_SCHEMA}"
    );
    out
}

/// Primary-path system prompt: creative, varied, constraint-bound.
pub fn generation_system_prompt(words: &WordSet, difficulty: Difficulty) -> String {
    let mut out = String::from(
        "You write fill-in-the-blank (cloze) exercises for language learners.\n\
         Be creative: vary subjects, settings and sentence openings so that every sentence feels fresh.\n\
         Never write templated or placeholder sentences such as \"The word is X.\" or \"This sentence uses X.\"\n",
    );
    let _ = writeln!(out, "{}", register_instruction(difficulty));
    out.push('\n');
    out.push_str(&hard_constraints(words));
    out
}

/// Stricter prompt for the ambiguity challenge verifier.
pub fn challenge_system_prompt(words: &WordSet) -> String {
    let mut out = String::from(
        "You are a strict reviewer of cloze exercises. For every blank, decide whether any word \
         other than the intended target would fit equally well grammatically and semantically.\n\
         Be conservative: only report an alternative a careful teacher would accept as correct.\n\n\
         The exercise was written under this contract:\n",
    );
    out.push_str(&hard_constraints(words));
    out.push_str(
        "\nIgnore the schema above for your own reply. Reply with ONE JSON object and nothing else:\n\
         {\"ok\": true|false, \"ambiguous\": [{\"index\": 1, \"alternatives\": [\"...\"], \"reason\": \"...\"}]}\n",
    );
    out
}

/// User message for a generation call.
pub fn user_payload(words: &WordSet, difficulty: Difficulty) -> String {
    serde_json::json!({
        "wordSet": words,
        "difficulty": difficulty,
        "sentence_count": words.len(),
    })
    .to_string()
}

pub fn build_generation_prompt(
    words: &WordSet,
    difficulty: Difficulty,
    feedback: Option<&str>,
) -> Prompt {
    Prompt {
        system: generation_system_prompt(words, difficulty),
        user: user_payload(words, difficulty),
        feedback: feedback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(ToString::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(list: &[&str]) -> WordSet {
        WordSet::new(list.iter().map(ToString::to_string).collect()).unwrap()
    }

    #[test]
    fn tiers_map_to_distinct_registers() {
        assert!(register_instruction(Difficulty::Green).contains("A2"));
        assert!(register_instruction(Difficulty::Yellow).contains("B1"));
        assert!(register_instruction(Difficulty::Red).contains("B2"));
    }

    #[test]
    fn red_tier_is_colder_with_larger_budget() {
        let green = sampling_params(Difficulty::Green);
        let red = sampling_params(Difficulty::Red);
        assert!(red.temperature < green.temperature);
        assert!(red.max_output_tokens > green.max_output_tokens);
        assert_eq!(sampling_params(Difficulty::Yellow), green);
    }

    #[test]
    fn system_prompt_embeds_contract() {
        let prompt = generation_system_prompt(&set(&["whale", "owl"]), Difficulty::Green);
        assert!(prompt.contains("exactly 2 independent sentences"));
        assert!(prompt.contains("\"whale\", \"owl\""));
        assert!(prompt.contains("exactly once"));
        assert!(prompt.contains(BLANK));
        assert!(prompt.contains("The word is X"));
        assert!(prompt.contains("\"gaps_meta\""));
        assert!(!prompt.contains("Multi-word targets"));
    }

    #[test]
    fn phrase_rule_only_with_multi_word_targets() {
        let prompt = generation_system_prompt(&set(&["equal rights", "owl"]), Difficulty::Red);
        assert!(prompt.contains("Multi-word targets (\"equal rights\")"));
    }

    #[test]
    fn challenge_prompt_shares_contract() {
        let prompt = challenge_system_prompt(&set(&["whale"]));
        assert!(prompt.contains("exactly once"));
        assert!(prompt.contains("\"ambiguous\""));
    }

    #[test]
    fn user_payload_preserves_word_order() {
        let payload: serde_json::Value =
            serde_json::from_str(&user_payload(&set(&["owl", "whale"]), Difficulty::Yellow)).unwrap();
        assert_eq!(payload["wordSet"], serde_json::json!(["owl", "whale"]));
        assert_eq!(payload["difficulty"], "yellow");
        assert_eq!(payload["sentence_count"], 2);
    }

    #[test]
    fn blank_feedback_is_dropped() {
        let words = set(&["owl"]);
        assert!(build_generation_prompt(&words, Difficulty::Green, Some("  ")).feedback.is_none());
        assert_eq!(
            build_generation_prompt(&words, Difficulty::Green, Some("fix it"))
                .feedback
                .as_deref(),
            Some("fix it")
        );
    }
}
