#![deny(unsafe_code)]

//! agentlens core: static extraction of agent declarations.
//!
//! Reads ADK-style Python sources as plain text, finds `identifier = Kind(...)`
//! agent declarations, resolves references across files through `from ...
//! import ...` statements, and assembles flat and nested views. Nothing is
//! executed; the scan has no side effects on the source tree.

/// Balanced-bracket scanning and top-level comma splitting.
pub mod brackets;
/// `AgentTool(...)` reclassification of tool entries.
pub mod classify;
/// Definition lookup for editor navigation.
pub mod definition;
/// Keyword-argument field extraction.
pub mod fields;
/// Flat index merge and nested hierarchy expansion.
pub mod hierarchy;
/// Import statement parsing and module path resolution.
pub mod imports;
/// Constructor-form declaration locator.
pub mod locator;
/// Warning and error collector for scan summaries.
pub mod logging;
/// Scan output records.
pub mod model;
/// Root-relative path rendering and source file reading.
pub mod paths;
/// Concurrent directory scanning.
pub mod scanner;

pub use definition::{
    DEFAULT_LINE, DefinitionLocation, DefinitionLocator, QueryKind, ToolLocation,
};
pub use hierarchy::{FlatIndex, HierarchyBuilder};
pub use imports::{ImportResolver, Resolution};
pub use logging::{Diagnostic, DiagnosticCollector, DiagnosticReader};
pub use model::{
    AgentNode, ConstructorKind, FileHierarchy, FileScan, HierarchyNode, ImportRecord, NestedFile,
    NestedScanResult, RefKind, Reference, ScanResult, SourceLocation,
};
pub use scanner::{DirectoryScan, ScanError, Scanner, analyze_file, extract_agents};
