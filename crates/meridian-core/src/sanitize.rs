//! Input hygiene for inbound coaching text.
//!
//! Strips control characters and invisible codepoints, collapses whitespace
//! runs, and enforces the transport length bounds before anything reaches
//! the cache key, the safety scan, or a model prompt.

use crate::error::MeridianError;

/// Longest question accepted.
pub const QUESTION_MAX_LEN: usize = 1000;
/// Shortest question accepted.
pub const QUESTION_MIN_LEN: usize = 2;
/// Longest context hint accepted.
pub const HINT_MAX_LEN: usize = 120;

/// Zero-width and directional codepoints stripped from input.
const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}', '\u{200E}', '\u{200F}',
];

/// Clean a text fragment: drop control and invisible characters, collapse
/// whitespace runs to single spaces, trim, and cap at `max_len` characters.
pub fn clean_text(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_len));
    let mut pending_space = false;
    for ch in input.chars() {
        if ch.is_control() || INVISIBLE.contains(&ch) {
            if ch.is_whitespace() {
                pending_space = true;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
        if out.chars().count() >= max_len {
            break;
        }
    }
    out
}

/// Sanitize a coaching question, enforcing the length bounds.
pub fn sanitize_question(input: &str) -> Result<String, MeridianError> {
    let cleaned = clean_text(input, QUESTION_MAX_LEN);
    if cleaned.chars().count() < QUESTION_MIN_LEN {
        return Err(MeridianError::Invalid(
            "question must be at least 2 characters".to_string(),
        ));
    }
    Ok(cleaned)
}

/// Sanitize an optional context hint; empty hints collapse to `None`.
pub fn sanitize_hint(input: Option<&str>) -> Option<String> {
    let cleaned = clean_text(input?, HINT_MAX_LEN);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
