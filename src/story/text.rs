//! Text primitives shared by the parser and the validators: the blank marker,
//! word-boundary matching and sentence splitting.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Canonical blank marker in `gap_text`.
pub const BLANK: &str = "______";

#[allow(clippy::expect_used)]
static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{6,}").expect("valid regex"));

/// Oracles often shorten the marker; three or more underscores still mean a blank.
#[allow(clippy::expect_used)]
static LOOSE_BLANK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{3,}").expect("valid regex"));

const PLACEHOLDER_PHRASE: &str = "the word is";

/// Letters that continue a word: ASCII alphanumerics, Latin-1 letters
/// (Å, Ä, Ö, é, ...) and Latin Extended-A.
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{17F}')
}

/// Case-insensitive matcher for one target word or phrase that only accepts
/// hits not embedded in a longer word.
#[derive(Debug, Clone)]
pub struct WordMatcher {
    regex: Regex,
}

impl WordMatcher {
    /// Returns `None` for a blank target.
    pub fn new(target: &str) -> Option<Self> {
        let tokens: Vec<String> = target.split_whitespace().map(regex::escape).collect();
        if tokens.is_empty() {
            return None;
        }
        let pattern = format!("(?i){}", tokens.join(r"\s+"));
        Regex::new(&pattern).ok().map(|regex| Self { regex })
    }

    /// Byte ranges of every bounded, non-overlapping hit.
    pub fn find_all(&self, text: &str) -> Vec<Range<usize>> {
        let mut hits = Vec::new();
        let mut pos = 0;
        while pos <= text.len() {
            let Some(m) = self.regex.find_at(text, pos) else {
                break;
            };
            if is_bounded(text, m.start(), m.end()) {
                hits.push(m.range());
                pos = m.end();
            } else {
                // A rejected hit may hide a bounded one starting inside it.
                pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
        }
        hits
    }

    pub fn find_first(&self, text: &str) -> Option<Range<usize>> {
        self.find_all(text).into_iter().next()
    }

    pub fn count(&self, text: &str) -> usize {
        self.find_all(text).len()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.find_first(text).is_some()
    }
}

fn is_bounded(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start].chars().next_back().is_none_or(|c| !is_word_char(c));
    let after_ok = text[end..].chars().next().is_none_or(|c| !is_word_char(c));
    before_ok && after_ok
}

/// Case-insensitive, word-boundary occurrence count of `target` in `text`.
pub fn count_occurrences(text: &str, target: &str) -> usize {
    WordMatcher::new(target).map_or(0, |m| m.count(text))
}

pub fn contains_word(text: &str, target: &str) -> bool {
    WordMatcher::new(target).is_some_and(|m| m.is_match(text))
}

/// Number of blank markers; each maximal underscore run counts once.
pub fn count_blanks(text: &str) -> usize {
    BLANK_RUN_RE.find_iter(text).count()
}

pub fn has_blanks(text: &str) -> bool {
    count_blanks(text) > 0
}

/// Rewrites every run of three or more underscores to the canonical marker.
pub fn canonicalize_blanks(text: &str) -> String {
    LOOSE_BLANK_RE.replace_all(text, BLANK).into_owned()
}

/// Detects templated filler such as "The word is whale."
pub fn contains_placeholder(text: &str) -> bool {
    text.to_lowercase().contains(PLACEHOLDER_PHRASE)
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201D}' | '\u{2019}' | ')' | ']')
}

/// Trimmed byte ranges of the sentences in `text`.
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes) followed by
/// whitespace or the end of the text.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminal(next) || is_closer(next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let at_boundary = chars.peek().is_none_or(|&(_, next)| next.is_whitespace());
        if at_boundary {
            push_trimmed(text, start..end, &mut spans);
            start = end;
        }
    }
    push_trimmed(text, start..text.len(), &mut spans);
    spans
}

fn push_trimmed(text: &str, range: Range<usize>, spans: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead + trail < slice.len() {
        spans.push(range.start + lead..range.end - trail);
    }
}

pub fn split_sentences(text: &str) -> Vec<&str> {
    sentence_spans(text)
        .into_iter()
        .map(|span| &text[span])
        .collect()
}

/// Lowercased word tokens, apostrophes kept inside words.
pub fn tokens(sentence: &str) -> Vec<String> {
    sentence
        .split(|c: char| !(is_word_char(c) || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
