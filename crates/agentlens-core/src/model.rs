//! Records produced by a scan: declarations, references, imports, and the
//! flat and nested views assembled from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The constructor an agent declaration was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructorKind {
    LlmAgent,
    Sequential,
    Loop,
    Parallel,
    /// The bare `Agent(...)` constructor.
    Generic,
}

impl ConstructorKind {
    /// Every recognised kind, in the order the locator tries them.
    pub const ALL: [ConstructorKind; 5] = [
        ConstructorKind::LlmAgent,
        ConstructorKind::Sequential,
        ConstructorKind::Loop,
        ConstructorKind::Parallel,
        ConstructorKind::Generic,
    ];

    /// The callable name as written in source.
    pub fn constructor(self) -> &'static str {
        match self {
            ConstructorKind::LlmAgent => "LlmAgent",
            ConstructorKind::Sequential => "SequentialAgent",
            ConstructorKind::Loop => "LoopAgent",
            ConstructorKind::Parallel => "ParallelAgent",
            ConstructorKind::Generic => "Agent",
        }
    }

    /// Map a callable name back to its kind.
    pub fn from_constructor(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.constructor() == name)
    }
}

impl std::fmt::Display for ConstructorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.constructor())
    }
}

/// What a reference is expected to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// An opaque callable or constant. Never resolved.
    Tool,
    /// Another agent, resolved on demand against the index or imports.
    AgentRef,
}

/// An identifier taken from a `tools` or `sub_agents` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub kind: RefKind,
}

impl Reference {
    pub fn tool(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: RefKind::Tool,
        }
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: RefKind::AgentRef,
        }
    }
}

/// Where a declaration starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path relative to the scan root, `/`-separated.
    pub file: String,
    /// 1-based line of the binding.
    pub line: u32,
}

/// One agent declaration, `identifier = Kind(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentNode {
    /// The local binding name.
    pub identifier: String,
    pub kind: ConstructorKind,
    /// The declared display name (`name="..."`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    #[serde(default)]
    pub sub_agents: Vec<Reference>,
    #[serde(default)]
    pub tools: Vec<Reference>,
    #[serde(default)]
    pub agent_tools: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_contents: Option<String>,
    pub location: SourceLocation,
}

/// One `from module import symbol` binding relevant to agents or tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    /// The name bound in the importing file (the alias, if any).
    pub symbol: String,
    /// The name as defined in the source module.
    pub original: String,
    /// Dotted module path, including any leading dots.
    pub module: String,
    /// Best-effort source file, relative to the scan root when inside it.
    pub resolved: String,
    /// Whether `resolved` was confirmed to exist.
    pub verified: bool,
    /// The statement as written.
    pub statement: String,
    /// 1-based line of the statement.
    pub line: u32,
}

/// Per-file flat view: every declaration plus the file's root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHierarchy {
    pub root: Option<AgentNode>,
    pub agents: BTreeMap<String, AgentNode>,
}

/// Scan output for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileScan {
    pub file_path: String,
    pub file_name: String,
    pub has_agents: bool,
    pub agent_count: usize,
    pub hierarchy: FileHierarchy,
}

/// Directory-wide flat scan output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scan_time: DateTime<Utc>,
    /// Files that were read successfully.
    pub total_files: usize,
    pub files_with_agents: usize,
    pub total_agents: usize,
    /// Files that could not be read; they are excluded from every total.
    #[serde(default)]
    pub unreadable_files: Vec<String>,
    /// Files containing at least one declaration, sorted by path.
    pub files: Vec<FileScan>,
}

/// A declaration with its sub-agents expanded into embedded children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub identifier: String,
    pub kind: ConstructorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_contents: Option<String>,
    /// File the declaration lives in.
    pub file: String,
    pub line: u32,
    /// True when the declaration lives in a different file than its parent.
    pub imported: bool,
    /// Opaque tool identifiers.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Identifiers of agents wrapped as tools; they also appear in `sub_agents`.
    #[serde(default)]
    pub agent_tools: Vec<String>,
    #[serde(default)]
    pub sub_agents: Vec<HierarchyNode>,
    /// Sub-agent identifiers that resolved nowhere.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
    /// Sub-agent identifiers not expanded because they are already on the path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<String>,
}

impl HierarchyNode {
    /// Copy a declaration's scalar fields; children are filled in by the caller.
    pub(crate) fn shell(node: &AgentNode, imported: bool) -> Self {
        Self {
            identifier: node.identifier.clone(),
            kind: node.kind,
            name: node.name.clone(),
            description: node.description.clone(),
            model: node.model.clone(),
            instruction: node.instruction.clone(),
            output_key: node.output_key.clone(),
            max_iterations: node.max_iterations,
            include_contents: node.include_contents.clone(),
            file: node.location.file.clone(),
            line: node.location.line,
            imported,
            tools: node.tools.iter().map(|r| r.id.clone()).collect(),
            agent_tools: node.agent_tools.iter().map(|r| r.id.clone()).collect(),
            sub_agents: Vec::new(),
            unresolved: Vec::new(),
            cycles: Vec::new(),
        }
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.sub_agents.iter().map(Self::node_count).sum::<usize>()
    }

    /// Depth-first search for a descendant (or `self`) by identifier.
    pub fn find(&self, identifier: &str) -> Option<&HierarchyNode> {
        if self.identifier == identifier {
            return Some(self);
        }
        self.sub_agents.iter().find_map(|child| child.find(identifier))
    }
}

/// Nested view for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedFile {
    pub file_path: String,
    pub file_name: String,
    pub has_agents: bool,
    pub agent_count: usize,
    pub hierarchy: Option<HierarchyNode>,
}

/// Directory-wide nested output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedScanResult {
    pub scan_time: DateTime<Utc>,
    pub total_files: usize,
    pub files_with_agents: usize,
    pub total_agents: usize,
    #[serde(default)]
    pub unreadable_files: Vec<String>,
    pub files: Vec<NestedFile>,
}
