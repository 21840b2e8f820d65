//! Balanced-bracket scanning shared by every component that needs to see
//! nesting structure in raw source text.
//!
//! Brackets are counted purely by character. Brackets inside string literals
//! or comments are treated as structural, so a stray `)` inside a string ends
//! a block early. Callers accept that limitation; nothing here special-cases it.

/// Opening brackets recognised by [`split_top_level`] and [`depth_at`].
const OPENERS: [u8; 3] = [b'(', b'[', b'{'];
/// Closing brackets, index-aligned with [`OPENERS`].
const CLOSERS: [u8; 3] = [b')', b']', b'}'];

/// Find the bracket that closes the one at `open`.
///
/// The character at `open` selects the bracket pair; only that pair is
/// counted (+1 per opener, -1 per closer). Returns the byte offset of the
/// matching closer, or `None` when `open` is not an opening bracket or the
/// depth never returns to zero.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let kind = OPENERS.iter().position(|&b| Some(&b) == bytes.get(open))?;
    let (opener, closer) = (OPENERS[kind], CLOSERS[kind]);

    let mut depth = 0usize;
    for (offset, &b) in bytes.iter().enumerate().skip(open) {
        if b == opener {
            depth += 1;
        } else if b == closer {
            depth -= 1;
            if depth == 0 {
                return Some(offset);
            }
        }
    }
    None
}

/// Return the text strictly between the bracket at `open` and its match.
pub fn inner_block(text: &str, open: usize) -> Option<&str> {
    let close = matching_close(text, open)?;
    Some(&text[open + 1..close])
}

/// Split `text` on commas that sit at nesting depth zero.
///
/// All three bracket kinds contribute to depth, so list entries that are
/// themselves calls (`AgentTool(agent=x, skip=True)`) stay whole. Entries are
/// trimmed and empty entries (trailing commas) are dropped.
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (offset, b) in text.bytes().enumerate() {
        if OPENERS.contains(&b) {
            depth += 1;
        } else if CLOSERS.contains(&b) {
            depth -= 1;
        } else if b == b',' && depth == 0 {
            parts.push(&text[start..offset]);
            start = offset + 1;
        }
    }
    parts.push(&text[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Nesting depth of `offset` within `text`, counting all bracket kinds.
///
/// Depth is clamped at zero so that unbalanced closers earlier in the text
/// do not make later positions look nested.
pub fn depth_at(text: &str, offset: usize) -> usize {
    let mut depth = 0usize;
    for b in text.bytes().take(offset) {
        if OPENERS.contains(&b) {
            depth += 1;
        } else if CLOSERS.contains(&b) {
            depth = depth.saturating_sub(1);
        }
    }
    depth
}

/// 1-based line number of a byte offset.
pub fn line_at(text: &str, offset: usize) -> u32 {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_matching_close_simple() {
        let text = "Agent(name='a')";
        assert_eq!(matching_close(text, 5), Some(14));
    }

    #[test]
    fn test_matching_close_nested_calls() {
        let text = "f(g(1,2),3) tail";
        assert_eq!(matching_close(text, 1), Some(10));
        assert_eq!(inner_block(text, 1), Some("g(1,2),3"));
    }

    #[test]
    fn test_matching_close_only_counts_own_pair() {
        let text = "[a(], b]";
        // The ']' inside the call is structural for a '[' scan.
        assert_eq!(matching_close(text, 0), Some(3));
        assert_eq!(matching_close(text, 2), None);
    }

    #[test]
    fn test_matching_close_unterminated() {
        assert_eq!(matching_close("Agent(name='a'", 5), None);
    }

    #[test]
    fn test_matching_close_not_a_bracket() {
        assert_eq!(matching_close("abc", 0), None);
        assert_eq!(matching_close("abc", 10), None);
    }

    #[test]
    fn test_paren_in_string_is_structural() {
        // Documented limitation: the ')' in the string closes the block.
        let text = r#"Agent(instruction="1) do it", name="x")"#;
        let close = matching_close(text, 5).unwrap();
        assert_eq!(&text[6..close], r#"instruction="1"#);
    }

    #[test]
    fn test_split_top_level_plain() {
        assert_eq!(split_top_level("t1, t2 ,t3"), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_split_top_level_keeps_nested_commas() {
        let parts = split_top_level("search, AgentTool(agent=helper, skip=True), {'a': 1, 'b': 2}, [x, y]");
        assert_eq!(
            parts,
            vec![
                "search",
                "AgentTool(agent=helper, skip=True)",
                "{'a': 1, 'b': 2}",
                "[x, y]"
            ]
        );
    }

    #[test]
    fn test_split_top_level_drops_empty_entries() {
        assert_eq!(split_top_level("\n  a,\n  b,\n"), vec!["a", "b"]);
        assert!(split_top_level("  ").is_empty());
    }

    #[test]
    fn test_depth_at() {
        let text = "a=1, b=f(c=2), d=[e]";
        assert_eq!(depth_at(text, 0), 0);
        assert_eq!(depth_at(text, text.find("c=").unwrap()), 1);
        assert_eq!(depth_at(text, text.find("d=").unwrap()), 0);
        assert_eq!(depth_at(text, text.find("e]").unwrap()), 1);
    }

    #[test]
    fn test_depth_at_clamps_stray_closers() {
        assert_eq!(depth_at(") ) x", 4), 0);
    }

    #[test]
    fn test_line_at() {
        let text = "one\ntwo\nthree";
        assert_eq!(line_at(text, 0), 1);
        assert_eq!(line_at(text, 4), 2);
        assert_eq!(line_at(text, text.len()), 3);
        assert_eq!(line_at(text, 1000), 3);
    }
}
