//! Content Cleaner — markup stripping and boundary-aware truncation.
//!
//! Tracker fields such as descriptions and acceptance criteria arrive as
//! HTML fragments. [`clean`] reduces them to a single line of plain text;
//! [`truncate`] bounds a field at a sentence or word boundary; and
//! [`hard_truncate`] is the last-resort cut used on whole contexts.
//!
//! All lengths are counted in chars, never bytes.

use std::sync::LazyLock;

use regex::Regex;

/// Element tags (`<b>`, `</p>`, `<br/>`, `<!DOCTYPE html>`) and comments.
///
/// A `<` must be followed directly by a tag name, so prose such as
/// `a < b and c > d` is left alone.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<[/!?]?[A-Za-z][^<>]*>").expect("TAG_RE regex should compile")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_RE regex should compile"));

/// Entities decoded by [`clean`]. Anything else is left verbatim.
const ENTITIES: [(&str, &str); 4] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
];

/// Appended when [`truncate`] falls back to a word boundary.
pub const ELLIPSIS: &str = "...";

/// A sentence end must sit at or past this fraction of the limit to be used.
const SENTENCE_CUT_RATIO: f64 = 0.8;

/// Strip tags, decode entities, collapse whitespace, trim.
///
/// Tag stripping and entity decoding repeat until nothing changes, so an
/// escaped tag (`&lt;b&gt;`) is removed too and `clean(clean(t)) == clean(t)`.
pub fn clean(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut current = text.to_string();
    loop {
        let stripped = TAG_RE.replace_all(&current, "");
        let decoded = decode_entities(&stripped);
        if decoded == current {
            break;
        }
        current = decoded;
    }

    WHITESPACE_RE
        .replace_all(&current, " ")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, plain)| {
            acc.replace(entity, plain)
        })
}

/// Bound `text` to `limit` chars, preferring a sentence boundary.
///
/// Returns `text` unchanged when it fits. Otherwise cuts just after the
/// last `.`, `!` or `?` inside the limit if that lies in the final 20% of
/// it; failing that, cuts at the last whitespace and appends [`ELLIPSIS`].
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let head = prefix_chars(text, limit);

    let sentence_end = head
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| matches!(c, '.' | '!' | '?'))
        .last();
    if let Some((char_pos, (byte_pos, c))) = sentence_end {
        if char_pos as f64 >= limit as f64 * SENTENCE_CUT_RATIO {
            return head[..byte_pos + c.len_utf8()].to_string();
        }
    }

    let last_space = head
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .last();
    match last_space {
        Some(byte_pos) if byte_pos > 0 => format!("{}{ELLIPSIS}", head[..byte_pos].trim_end()),
        _ => format!("{head}{ELLIPSIS}"),
    }
}

/// [`clean`] followed by [`truncate`].
pub fn clean_and_truncate(text: &str, limit: usize) -> String {
    truncate(&clean(text), limit)
}

/// Cut `text` to at most `max_chars` chars with no boundary logic.
///
/// Returns the (possibly shortened) text and whether anything was cut.
pub fn hard_truncate(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_end, _)) => (text[..byte_end].to_string(), true),
        None => (text.to_string(), false),
    }
}

fn prefix_chars(text: &str, n: usize) -> &str {
    let byte_end = text
        .char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..byte_end]
}
