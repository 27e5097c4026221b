//! Lenient decoding of oracle output into the canonical [`Exercise`].
//!
//! The oracle follows no enforced schema. Every shape mismatch is reconciled
//! here into a best-effort exercise; judging validity is left to the
//! validators.

use super::text::{
    BLANK, WordMatcher, canonicalize_blanks, count_blanks, has_blanks, sentence_spans,
};
use super::types::{Exercise, GapMeta, Reject, WordSet};
use serde_json::{Map, Value};
use std::ops::Range;

/// Most rejected alternatives kept per gap.
const MAX_REJECTS: usize = 2;

/// Parses `raw` as JSON, falling back to the first balanced `{...}` span that
/// parses as an object.
pub fn parse_model_json(raw: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(map);
    }

    let mut search_from = 0;
    while let Some(span) = next_object_span(raw, search_from) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw[span.clone()]) {
            return Some(map);
        }
        search_from = span.start + 1;
    }
    None
}

/// Byte range of the next brace-balanced object starting at or after `from`.
/// Braces inside JSON strings are ignored.
fn next_object_span(text: &str, mut from: usize) -> Option<Range<usize>> {
    loop {
        let start = from + text.get(from..)?.find('{')?;
        if let Some(len) = balanced_len(&text[start..]) {
            return Some(start..start + len);
        }
        // Unbalanced from this brace; a later one may still close.
        from = start + 1;
    }
}

/// Length of the object opening at the first byte of `text`, if it closes.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn join_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(scalar_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fills the blanks of `gap_text` in order with `words`. Surplus blanks stay.
pub fn rebuild_solution_from_gap(gap_text: &str, words: &[String]) -> String {
    let gap_text = canonicalize_blanks(gap_text);
    let mut out = String::with_capacity(gap_text.len());
    let mut rest = gap_text.as_str();
    let mut next_word = words.iter();

    while let Some(pos) = rest.find(BLANK) {
        let run_len = rest[pos..].chars().take_while(|c| *c == '_').count();
        out.push_str(&rest[..pos]);
        match next_word.next() {
            Some(word) => out.push_str(word),
            None => out.push_str(&rest[pos..pos + run_len]),
        }
        rest = &rest[pos + run_len..];
    }
    out.push_str(rest);
    out
}

/// Blanks each target in the first not-yet-used sentence that contains it.
///
/// Returns `None` when the solution has fewer sentences than targets.
/// Targets found nowhere are left out, so the blank count exposes them.
pub fn rebuild_gap_from_solution(solution_text: &str, words: &[String]) -> Option<String> {
    let spans = sentence_spans(solution_text);
    if spans.len() < words.len() {
        return None;
    }

    let mut consumed = vec![false; spans.len()];
    let mut replacements: Vec<Range<usize>> = Vec::with_capacity(words.len());

    for word in words {
        let Some(matcher) = WordMatcher::new(word) else {
            continue;
        };
        for (idx, span) in spans.iter().enumerate() {
            if consumed[idx] {
                continue;
            }
            if let Some(hit) = matcher.find_first(&solution_text[span.clone()]) {
                consumed[idx] = true;
                replacements.push(span.start + hit.start..span.start + hit.end);
                break;
            }
        }
    }

    replacements.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(solution_text.len());
    let mut cursor = 0;
    for range in replacements {
        out.push_str(&solution_text[cursor..range.start]);
        out.push_str(BLANK);
        cursor = range.end;
    }
    out.push_str(&solution_text[cursor..]);
    Some(out)
}

fn reconcile_gap_text(obj: &Map<String, Value>) -> String {
    let gap = match obj.get("gap_text") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => join_parts(parts),
        _ => String::new(),
    };
    canonicalize_blanks(&gap)
}

fn reconcile_solution_text(obj: &Map<String, Value>, gap_text: &str, words: &[String]) -> String {
    match obj.get("solution_text") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Array(parts)) if parts.len() == words.len() && has_blanks(gap_text) => {
            rebuild_solution_from_gap(gap_text, words)
        }
        Some(Value::Array(parts)) if !parts.is_empty() => join_parts(parts),
        _ if has_blanks(gap_text) => rebuild_solution_from_gap(gap_text, words),
        _ => String::new(),
    }
}

fn parse_index(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_rejects(value: Option<&Value>) -> Vec<Reject> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(o) => Some(Reject {
                word: o.get("word").and_then(scalar_to_string)?,
                reason: o
                    .get("reason")
                    .and_then(scalar_to_string)
                    .unwrap_or_default(),
            }),
            Value::String(word) => Some(Reject {
                word: word.clone(),
                reason: String::new(),
            }),
            _ => None,
        })
        .take(MAX_REJECTS)
        .collect()
}

fn default_gaps_meta(words: &[String]) -> Vec<GapMeta> {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| GapMeta {
            index: i + 1,
            correct: word.clone(),
            why_unique: String::new(),
            rejects: Vec::new(),
        })
        .collect()
}

/// One entry per target, 1-indexed in word order.
///
/// Oracle entries claim the slot their index names, or their position when
/// the index is missing or out of range. `index` and `correct` always come
/// from the word set; surplus entries are dropped and empty slots get the
/// default entry.
fn reconcile_gaps_meta(obj: &Map<String, Value>, words: &[String]) -> Vec<GapMeta> {
    let entries: Vec<&Map<String, Value>> = match obj.get("gaps_meta") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    };
    let mut meta = default_gaps_meta(words);
    if entries.is_empty() {
        return meta;
    }

    let raw_indices: Vec<Option<usize>> = entries
        .iter()
        .map(|entry| parse_index(entry.get("index")))
        .collect();
    // Legacy 0-based output: shift every index when any entry uses 0.
    let shift = usize::from(raw_indices.contains(&Some(0)));
    let in_range = |i: &usize| (1..=words.len()).contains(i);

    let mut claimed = vec![false; words.len()];
    for (pos, (entry, index)) in entries.iter().zip(raw_indices).enumerate() {
        let slot = index
            .and_then(|i| i.checked_add(shift))
            .filter(in_range)
            .or_else(|| Some(pos + 1).filter(in_range));
        let Some(slot) = slot else { continue };
        if claimed[slot - 1] {
            continue;
        }
        claimed[slot - 1] = true;
        let gap = &mut meta[slot - 1];
        gap.why_unique = entry
            .get("why_unique")
            .and_then(scalar_to_string)
            .unwrap_or_default();
        gap.rejects = parse_rejects(entry.get("rejects"));
    }
    meta
}

fn reconcile_notes(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get("notes") {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    }
}

/// Decodes oracle output into an [`Exercise`], or `None` when no JSON object
/// can be recovered at all.
///
/// `used_words` always mirrors `expected`, whatever the oracle echoed.
pub fn normalize(raw: &str, expected: &WordSet) -> Option<Exercise> {
    let obj = parse_model_json(raw)?;
    let words = expected.as_slice();

    let mut gap_text = reconcile_gap_text(&obj);
    let solution_text = reconcile_solution_text(&obj, &gap_text, words);

    if count_blanks(&gap_text) == 0
        && !solution_text.trim().is_empty()
        && let Some(rebuilt) = rebuild_gap_from_solution(&solution_text, words)
    {
        gap_text = rebuilt;
    }

    Some(Exercise {
        gap_text,
        solution_text,
        used_words: words.to_vec(),
        gaps_meta: reconcile_gaps_meta(&obj, words),
        notes: reconcile_notes(&obj),
    })
}
