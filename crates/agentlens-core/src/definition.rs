//! Definition lookup: "where is identifier X defined", seen from one file.

use std::path::Path;
use std::sync::LazyLock;

use agentlens_config::DefinitionConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::brackets::matching_close;
use crate::imports::ImportResolver;
use crate::locator::agent_binding_pattern;
use crate::model::{ConstructorKind, ImportRecord};
use crate::paths::{from_display, read_source};
use crate::scanner::extract_agents;

/// Line reported when nothing was found: the top of the file.
pub const DEFAULT_LINE: u32 = 1;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("identifier pattern is valid"));

/// What kind of definition a query is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Agent,
    Tool,
}

/// Answer to a definition query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionLocation {
    pub found: bool,
    /// File holding the definition (or the queried file when not found).
    pub actual_file: String,
    /// 1-based; [`DEFAULT_LINE`] when not found.
    pub line_number: u32,
    pub is_imported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor_kind: Option<ConstructorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_signature: Option<String>,
}

impl DefinitionLocation {
    fn not_found(file: &str) -> Self {
        Self {
            found: false,
            actual_file: file.to_string(),
            line_number: DEFAULT_LINE,
            is_imported: false,
            import_statement: None,
            context_snippet: None,
            constructor_kind: None,
            function_signature: None,
        }
    }
}

/// One tool of an agent, with where that tool is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolLocation {
    pub tool_name: String,
    #[serde(flatten)]
    pub location: DefinitionLocation,
}

/// A definition found in one file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hit {
    /// 0-based line index.
    line: usize,
    constructor_kind: Option<ConstructorKind>,
    function_signature: Option<String>,
}

/// Answers definition queries against files under a scan root.
pub struct DefinitionLocator<'a> {
    resolver: &'a ImportResolver,
    config: &'a DefinitionConfig,
}

impl<'a> DefinitionLocator<'a> {
    pub fn new(resolver: &'a ImportResolver, config: &'a DefinitionConfig) -> Self {
        Self { resolver, config }
    }

    /// Locate `identifier` as seen from `file` (root-relative).
    ///
    /// Search order:
    /// 1. the file's own text;
    /// 2. the source file of every import that binds `identifier`;
    /// 3. the source file of every other verified import, which finds
    ///    declarations living next to an imported agent (nested sub-agents).
    pub fn locate(&self, file: &str, identifier: &str, kind: QueryKind) -> DefinitionLocation {
        if !IDENTIFIER_RE.is_match(identifier) {
            debug!(identifier, "not a valid identifier");
            return DefinitionLocation::not_found(file);
        }

        let path = from_display(self.resolver.root(), file);
        let Some(text) = load(&path, file) else {
            return DefinitionLocation::not_found(file);
        };

        if let Some(hit) = find_definition(&text, identifier, kind) {
            return self.found(file, &text, hit, kind, None);
        }

        let table = self.resolver.import_table(&path, &text);
        let bindings: Vec<&ImportRecord> = table.iter().filter(|r| r.symbol == identifier).collect();

        for record in bindings.iter().filter(|r| r.verified) {
            if let Some(location) = self.search_import(record, &record.original, kind) {
                return location;
            }
        }

        let mut searched: Vec<&str> = bindings
            .iter()
            .filter(|r| r.verified && r.original == identifier)
            .map(|r| r.resolved.as_str())
            .collect();
        for record in table.iter().filter(|r| r.verified) {
            if searched.contains(&record.resolved.as_str()) {
                continue;
            }
            searched.push(&record.resolved);
            if let Some(location) = self.search_import(record, identifier, kind) {
                debug!(identifier, file = %record.resolved, "found next to an imported symbol");
                return location;
            }
        }

        match bindings.first() {
            // Imported, but the definition is not in the import's source.
            Some(record) => DefinitionLocation {
                is_imported: true,
                actual_file: record.resolved.clone(),
                import_statement: Some(record.statement.clone()),
                ..DefinitionLocation::not_found(file)
            },
            None => DefinitionLocation::not_found(file),
        }
    }

    /// Every plain tool of `agent` (as seen from `file`), each located from
    /// the file that declares the agent. Empty when the agent is not found.
    pub fn agent_tools(&self, file: &str, agent: &str) -> Vec<ToolLocation> {
        let owner = self.locate(file, agent, QueryKind::Agent);
        if !owner.found {
            return Vec::new();
        }

        let path = from_display(self.resolver.root(), &owner.actual_file);
        let Some(text) = load(&path, &owner.actual_file) else {
            return Vec::new();
        };
        // Aliased imports bind a different name, so match the declaration by line.
        let Some(node) = extract_agents(&owner.actual_file, &text)
            .into_iter()
            .find(|node| node.location.line == owner.line_number)
        else {
            return Vec::new();
        };

        node.tools
            .iter()
            .map(|tool| ToolLocation {
                tool_name: tool.id.clone(),
                location: self.locate(&owner.actual_file, &tool.id, QueryKind::Tool),
            })
            .collect()
    }

    fn search_import(
        &self,
        record: &ImportRecord,
        identifier: &str,
        kind: QueryKind,
    ) -> Option<DefinitionLocation> {
        let source_path = from_display(self.resolver.root(), &record.resolved);
        let source = load(&source_path, &record.resolved)?;
        let hit = find_definition(&source, identifier, kind)?;
        Some(self.found(&record.resolved, &source, hit, kind, Some(record)))
    }

    fn found(
        &self,
        file: &str,
        text: &str,
        hit: Hit,
        kind: QueryKind,
        import: Option<&ImportRecord>,
    ) -> DefinitionLocation {
        let after = match kind {
            QueryKind::Agent => self.config.agent_context_after,
            QueryKind::Tool => self.config.tool_context_after,
        };
        DefinitionLocation {
            found: true,
            actual_file: file.to_string(),
            line_number: hit.line as u32 + 1,
            is_imported: import.is_some(),
            import_statement: import.map(|r| r.statement.clone()),
            context_snippet: Some(context_snippet(text, hit.line, self.config.context_before, after)),
            constructor_kind: hit.constructor_kind,
            function_signature: hit.function_signature,
        }
    }
}

fn load(path: &Path, rel: &str) -> Option<String> {
    match read_source(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(file = rel, error = %err, "failed to read source file");
            None
        }
    }
}

/// First line in `text` that defines `identifier`.
///
/// Agent queries only accept constructor assignments. Tool queries also
/// accept `def identifier(` and a bare `identifier = ...` assignment.
fn find_definition(text: &str, identifier: &str, kind: QueryKind) -> Option<Hit> {
    let constructor = agent_binding_pattern(identifier)?;
    let escaped = regex::escape(identifier);
    let function = Regex::new(&format!(r"^\s*((?:async\s+)?def\s+{escaped}\s*)\(")).ok()?;
    let assignment = Regex::new(&format!(r"^\s*{escaped}\s*(?::[^=]*)?=(?:[^=]|$)")).ok()?;

    let mut line_start = 0;
    for (index, raw) in text.split_inclusive('\n').enumerate() {
        let line = raw.trim_end_matches(['\n', '\r']);
        let start = line_start;
        line_start += raw.len();

        if let Some(caps) = constructor.captures(line) {
            return Some(Hit {
                line: index,
                constructor_kind: caps
                    .get(1)
                    .and_then(|m| ConstructorKind::from_constructor(m.as_str())),
                function_signature: None,
            });
        }
        if kind == QueryKind::Agent {
            continue;
        }
        if let Some(caps) = function.captures(line) {
            let open = caps.get(0).map_or(0, |m| start + m.end() - 1);
            let def_start = caps.get(1).map_or(0, |m| start + m.start());
            return Some(Hit {
                line: index,
                constructor_kind: None,
                function_signature: function_signature(text, def_start, open),
            });
        }
        if assignment.is_match(line) {
            return Some(Hit {
                line: index,
                constructor_kind: None,
                function_signature: None,
            });
        }
    }
    None
}

/// `def name(args) -> ret`, whitespace collapsed, without the trailing colon.
fn function_signature(text: &str, def_start: usize, open: usize) -> Option<String> {
    let close = matching_close(text, open)?;
    let end = text[close..].find(':').map_or(close + 1, |at| close + at);
    let signature = text[def_start..end].split_whitespace().collect::<Vec<_>>().join(" ");
    Some(signature.replace("( ", "(").replace(", )", ")").replace(" )", ")"))
}

fn context_snippet(text: &str, line: usize, before: usize, after: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = line.saturating_sub(before);
    let end = (line + after + 1).min(lines.len());
    lines[start..end].join("\n")
}
