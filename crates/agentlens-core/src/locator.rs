//! Construct locator.
//!
//! Finds `identifier = Kind(` declarations in raw source and cuts out the
//! balanced argument block that follows each one.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::brackets::{line_at, matching_close};
use crate::model::ConstructorKind;

/// `identifier [: annotation] = [module.]Kind(` anchored at the start of a line.
static CONSTRUCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*([A-Za-z_]\w*)[ \t]*(?::[^=\n]*)?=[ \t]*(?:[A-Za-z_]\w*\.)*(LlmAgent|SequentialAgent|LoopAgent|ParallelAgent|Agent)[ \t]*\(",
    )
    .expect("construct pattern is valid")
});

/// One constructor-form declaration found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Construct<'a> {
    pub identifier: &'a str,
    pub kind: ConstructorKind,
    /// Text strictly between the constructor's parentheses.
    pub block: &'a str,
    /// 1-based line of the binding.
    pub line: u32,
    /// Byte offset of the identifier.
    pub offset: usize,
}

/// Locate every declaration in `text`, in source order.
///
/// Declarations whose argument block never closes are skipped. A match that
/// starts inside an earlier declaration's block (an inline `agent = Agent(`
/// keyword argument, for instance) belongs to that block and is not reported.
pub fn locate(text: &str) -> Vec<Construct<'_>> {
    let mut found = Vec::new();
    let mut covered_until = 0usize;

    for caps in CONSTRUCT_RE.captures_iter(text) {
        let (Some(whole), Some(ident), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        if ident.start() < covered_until {
            continue;
        }
        let Some(kind) = ConstructorKind::from_constructor(kind.as_str()) else {
            continue;
        };

        // The match always ends on the opening parenthesis.
        let open = whole.end() - 1;
        let Some(close) = matching_close(text, open) else {
            debug!(
                identifier = ident.as_str(),
                line = line_at(text, ident.start()),
                "skipping unterminated constructor block"
            );
            continue;
        };

        covered_until = close;
        found.push(Construct {
            identifier: ident.as_str(),
            kind,
            block: &text[open + 1..close],
            line: line_at(text, ident.start()),
            offset: ident.start(),
        });
    }

    found
}

/// The regex used to find a specific agent binding by name.
pub(crate) fn agent_binding_pattern(identifier: &str) -> Option<Regex> {
    let kinds = ConstructorKind::ALL.map(ConstructorKind::constructor).join("|");
    Regex::new(&format!(
        r"^\s*{}\s*(?::[^=]*)?=\s*(?:[A-Za-z_]\w*\.)*({kinds})\s*\(",
        regex::escape(identifier)
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_locate_simple() {
        let found = locate(r#"x = LlmAgent(name="a", tools=[t1, t2])"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier, "x");
        assert_eq!(found[0].kind, ConstructorKind::LlmAgent);
        assert_eq!(found[0].block, r#"name="a", tools=[t1, t2]"#);
        assert_eq!(found[0].line, 1);
    }

    #[test]
    fn test_locate_every_kind() {
        let text = "\
a = LlmAgent()
b = SequentialAgent()
c = LoopAgent()
d = ParallelAgent()
e = Agent()
";
        let kinds: Vec<_> = locate(text).iter().map(|c| (c.identifier, c.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("a", ConstructorKind::LlmAgent),
                ("b", ConstructorKind::Sequential),
                ("c", ConstructorKind::Loop),
                ("d", ConstructorKind::Parallel),
                ("e", ConstructorKind::Generic),
            ]
        );
    }

    #[test]
    fn test_locate_nested_call_block_is_balanced() {
        let found = locate("x = Agent(instruction=f(g(1,2),3), name='n')\ny = 1\n");
        assert_eq!(found[0].block, "instruction=f(g(1,2),3), name='n'");
    }

    #[test]
    fn test_locate_multiline_reports_start_line() {
        let text = "import os\n\n\nroot_agent = Agent(\n    name='root',\n)\n";
        let found = locate(text);
        assert_eq!(found[0].line, 4);
        assert_eq!(found[0].block.trim(), "name='root',");
    }

    #[test]
    fn test_locate_skips_unterminated_block() {
        let text = "broken = Agent(name='x'\nok = Agent(name='y')\n";
        let found = locate(text);
        // The unterminated block swallows nothing: `ok` is still reported.
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier, "ok");
    }

    #[test]
    fn test_locate_ignores_comments_and_comparisons() {
        let text = "# old = Agent(name='x')\nif y == Agent(name='z'):\n    pass\n";
        assert!(locate(text).is_empty());
    }

    #[test]
    fn test_locate_accepts_qualified_and_annotated() {
        let text = "a = agents.LlmAgent(name='a')\nb: BaseAgent = Agent(name='b')\n";
        let ids: Vec<_> = locate(text).iter().map(|c| c.identifier).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_locate_skips_declarations_nested_in_a_block() {
        let text = "\
outer = Agent(
    tools=[AgentTool(
        agent = Agent(name='inline'),
    )],
)
after = Agent(name='after')
";
        let ids: Vec<_> = locate(text).iter().map(|c| c.identifier).collect();
        assert_eq!(ids, vec!["outer", "after"]);
    }

    #[test]
    fn test_locate_does_not_match_longer_constructor_names() {
        assert!(locate("x = MyAgent(name='a')\n").is_empty());
        assert!(locate("x = AgentTool(agent=y)\n").is_empty());
    }

    #[test]
    fn test_agent_binding_pattern() {
        let re = agent_binding_pattern("helper").unwrap();
        assert!(re.is_match("helper = LoopAgent("));
        assert!(re.is_match("  helper=Agent ("));
        assert!(!re.is_match("helper_two = Agent("));
        assert!(!re.is_match("helper = build()"));
    }
}
