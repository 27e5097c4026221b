//! Redaction of credentials echoed back in provider error bodies.

use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

/// Key prefixes issued by common LLM vendors.
const PREFIX_PATTERNS: [&str; 5] = ["sk-", "sk_", "AIza", "eyJ", "hf_"];

/// Markers after which the next token is a credential.
const MARKER_PATTERNS: [&str; 8] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "api_key=",
    "access_token=",
    "\"api_key\":\"",
    "\"access_token\":\"",
    "\"token\":\"",
    "\"secret\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

fn redact_after(scrubbed: &mut String, marker: &str, keep_marker: bool) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let start = search_from + rel;
        let token_start = start + marker.len();
        let token_len: usize = scrubbed[token_start..]
            .chars()
            .take_while(|c| is_secret_char(*c))
            .map(char::len_utf8)
            .sum();

        if token_len == 0 {
            search_from = token_start;
            continue;
        }

        let replace_from = if keep_marker { token_start } else { start };
        scrubbed.replace_range(replace_from..token_start + token_len, REDACTED);
        search_from = replace_from + REDACTED.len();
    }
}

/// Scrub known secret-like token patterns from provider error strings.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let hit = PREFIX_PATTERNS
        .iter()
        .chain(MARKER_PATTERNS.iter())
        .any(|p| input.contains(p));
    if !hit {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in MARKER_PATTERNS {
        redact_after(&mut scrubbed, marker, true);
    }
    for prefix in PREFIX_PATTERNS {
        redact_after(&mut scrubbed, prefix, false);
    }
    Cow::Owned(scrubbed)
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }
    let truncated: String = scrubbed.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{truncated}...")
}
