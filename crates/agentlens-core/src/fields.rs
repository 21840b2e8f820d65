//! Field extraction from a raw constructor argument block.
//!
//! Only keyword arguments at nesting depth zero are considered, so a
//! `name=` inside a nested tool call never shadows the agent's own name.
//! Each field is parsed on its own; a malformed value leaves that field
//! unset and does not affect the others.

use std::collections::HashMap;

use crate::brackets::{matching_close, split_top_level};

/// Typed fields pulled out of one argument block, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub model: Option<String>,
    pub instruction: Option<String>,
    pub output_key: Option<String>,
    /// Raw tool entries, unclassified.
    pub tools: Vec<String>,
    pub sub_agents: Vec<String>,
    pub max_iterations: Option<u32>,
    pub include_contents: Option<String>,
}

/// Parse every recognised field out of `block`.
pub fn extract(block: &str) -> Fields {
    let keywords = top_level_keywords(block);
    let value = |key: &str| keywords.get(key).map(|&start| &block[start..]);

    Fields {
        name: value("name").and_then(single_line_string),
        description: value("description").and_then(text_string),
        model: value("model").and_then(model_token),
        instruction: value("instruction").and_then(|v| text_string(v).or_else(|| bare_expression(v))),
        output_key: value("output_key").and_then(single_line_string),
        tools: value("tools").map(list_entries).unwrap_or_default(),
        sub_agents: value("sub_agents").map(list_entries).unwrap_or_default(),
        max_iterations: value("max_iterations").and_then(integer_token),
        include_contents: value("include_contents").and_then(single_line_string),
    }
}

/// Map each top-level keyword to the byte offset where its value starts.
///
/// String literals are skipped so `instruction="set name=x"` does not
/// register a `name` keyword. The first occurrence of a keyword wins.
fn top_level_keywords(block: &str) -> HashMap<&str, usize> {
    let bytes = block.as_bytes();
    let mut keywords = HashMap::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'#' => {
                i = bytes[i..]
                    .iter()
                    .position(|&c| c == b'\n')
                    .map_or(bytes.len(), |n| i + n);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ if is_ident_start(b) && (i == 0 || !is_ident_continue(bytes[i - 1])) => {
                let start = i;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                let key = &block[start..i];
                let mut j = i;
                while j < bytes.len() && matches!(bytes[j], b' ' | b'\t' | b'\r' | b'\n') {
                    j += 1;
                }
                if depth == 0
                    && bytes.get(j) == Some(&b'=')
                    && bytes.get(j + 1) != Some(&b'=')
                    && (start == 0 || bytes[start - 1] != b'.')
                {
                    let mut value = j + 1;
                    while value < bytes.len() && bytes[value].is_ascii_whitespace() {
                        value += 1;
                    }
                    keywords.entry(key).or_insert(value);
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    keywords
}

/// Offset just past the string literal whose opening quote is at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' if !triple => return i,
            c if c == quote => {
                if !triple {
                    return i + 1;
                }
                if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                    return i + 3;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// A string literal at the start of `value`: the text between its quotes
/// and whether it was triple-quoted. Accepts `r`/`b`/`u`/`f` prefixes.
fn string_literal(value: &str) -> Option<(&str, bool)> {
    let prefix = value
        .bytes()
        .take(2)
        .take_while(|b| matches!(b, b'r' | b'R' | b'b' | b'B' | b'u' | b'U' | b'f' | b'F'))
        .count();
    let bytes = value.as_bytes();
    let start = prefix;
    let quote = *bytes.get(start)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    let content_start = if triple { start + 3 } else { start + 1 };
    let end = skip_string(bytes, start);
    let closing = if triple { 3 } else { 1 };
    if end < content_start + closing || end > bytes.len() {
        return None;
    }
    // `skip_string` stops at the end of input or at a newline in a
    // single-quoted string; neither is a closed literal.
    let closed = &bytes[end - closing..end];
    if end - closing < content_start || closed.iter().any(|&b| b != quote) {
        return None;
    }
    Some((&value[content_start..end - closing], triple))
}

fn single_line_string(value: &str) -> Option<String> {
    match string_literal(value)? {
        (content, false) => Some(content.to_string()),
        (content, true) if !content.contains('\n') => Some(content.to_string()),
        _ => None,
    }
}

fn text_string(value: &str) -> Option<String> {
    string_literal(value).map(|(content, _)| content.trim().to_string())
}

/// Non-literal expression up to the next top-level comma (`prompt.ROOT`).
fn bare_expression(value: &str) -> Option<String> {
    let first = value.trim_start();
    if first.starts_with(['"', '\'']) || string_literal(first).is_some() {
        return None;
    }
    let expr = split_top_level(first).into_iter().next()?;
    let expr = strip_comment(expr).trim();
    (!expr.is_empty()).then(|| expr.to_string())
}

/// Bare token up to a comma, whitespace or closing paren at depth zero,
/// with surrounding quotes removed.
fn model_token(value: &str) -> Option<String> {
    if let Some((content, _)) = string_literal(value) {
        return (!content.is_empty()).then(|| content.to_string());
    }

    let mut depth = 0usize;
    let mut end = value.len();
    for (offset, c) in value.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth == 0 => {
                end = offset;
                break;
            }
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                end = offset;
                break;
            }
            c if c.is_whitespace() && depth == 0 => {
                end = offset;
                break;
            }
            _ => {}
        }
    }

    let token = value[..end].trim_matches(|c| c == '"' || c == '\'');
    (!token.is_empty()).then(|| token.to_string())
}

fn integer_token(value: &str) -> Option<u32> {
    let digits = value.bytes().take_while(u8::is_ascii_digit).count();
    value[..digits].parse().ok()
}

/// Entries of a bracketed list at the start of `value`.
fn list_entries(value: &str) -> Vec<String> {
    if !value.starts_with('[') {
        return Vec::new();
    }
    let Some(close) = matching_close(value, 0) else {
        return Vec::new();
    };
    let inner: String = value[1..close]
        .lines()
        .map(strip_comment)
        .collect::<Vec<_>>()
        .join("\n");

    split_top_level(&inner)
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn strip_comment(line: &str) -> &str {
    line.find('#').map_or(line, |at| &line[..at])
}
