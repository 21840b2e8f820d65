//! Reference classification: splits raw tool entries into opaque tools and
//! agents wrapped with `AgentTool(...)`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::Reference;

static AGENT_TOOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z_]\w*\.)*AgentTool\s*\(\s*(?:agent\s*=\s*)?([A-Za-z_][\w.]*)\s*(?:[,)]|$)")
        .expect("agent tool pattern is valid")
});

/// References of one declaration after classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub tools: Vec<Reference>,
    pub agent_tools: Vec<Reference>,
    pub sub_agents: Vec<Reference>,
}

/// The wrapped agent identifier when `entry` is an `AgentTool(agent=...)` call.
pub fn agent_tool_target(entry: &str) -> Option<&str> {
    AGENT_TOOL_RE
        .captures(entry.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Classify raw `tools` and `sub_agents` entries.
///
/// Declared sub-agents keep their order. Each wrapped agent is appended to
/// the sub-agents after them unless it is already listed, so it is expanded
/// exactly once.
pub fn classify(raw_tools: &[String], raw_sub_agents: &[String]) -> Classified {
    let mut classified = Classified {
        sub_agents: raw_sub_agents.iter().map(|id| Reference::agent(id.as_str())).collect(),
        ..Classified::default()
    };

    for entry in raw_tools {
        match agent_tool_target(entry) {
            Some(target) => {
                classified.agent_tools.push(Reference::agent(target));
                if !classified.sub_agents.iter().any(|r| r.id == target) {
                    classified.sub_agents.push(Reference::agent(target));
                }
            }
            None => classified.tools.push(Reference::tool(entry.as_str())),
        }
    }

    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_agent_tool_target_forms() {
        assert_eq!(agent_tool_target("AgentTool(agent=helper)"), Some("helper"));
        assert_eq!(agent_tool_target("AgentTool( agent = helper )"), Some("helper"));
        assert_eq!(agent_tool_target("AgentTool(helper)"), Some("helper"));
        assert_eq!(
            agent_tool_target("AgentTool(agent=helper, skip_summarization=True)"),
            Some("helper")
        );
        assert_eq!(
            agent_tool_target("agent_tool.AgentTool(agent=sub.helper)"),
            Some("sub.helper")
        );
        assert_eq!(agent_tool_target("google_search"), None);
        assert_eq!(agent_tool_target("FunctionTool(func=lookup)"), None);
    }

    #[test]
    fn test_classify_moves_agent_tools() {
        let classified = classify(
            &strings(&["t1", "AgentTool(agent=helper)", "t2"]),
            &strings(&["planner"]),
        );
        let tool_ids: Vec<_> = classified.tools.iter().map(|r| r.id.as_str()).collect();
        let sub_ids: Vec<_> = classified.sub_agents.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(tool_ids, vec!["t1", "t2"]);
        assert_eq!(classified.agent_tools, vec![Reference::agent("helper")]);
        assert_eq!(sub_ids, vec!["planner", "helper"]);
    }

    #[test]
    fn test_classify_does_not_duplicate_declared_sub_agent() {
        let classified = classify(
            &strings(&["AgentTool(agent=helper)"]),
            &strings(&["helper"]),
        );
        assert_eq!(classified.sub_agents, vec![Reference::agent("helper")]);
        assert_eq!(classified.agent_tools, vec![Reference::agent("helper")]);
        assert!(classified.tools.is_empty());
    }

    #[test]
    fn test_classify_empty() {
        assert_eq!(classify(&[], &[]), Classified::default());
    }
}
