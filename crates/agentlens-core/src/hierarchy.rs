//! Hierarchy assembly.
//!
//! [`FlatIndex::merge`] folds per-file maps into one directory-wide index
//! under an explicit [`MergePolicy`]. [`HierarchyBuilder`] then expands
//! sub-agent references into nested [`HierarchyNode`] trees, following
//! imports into other files when a reference is not in the index.

use std::collections::{BTreeMap, HashMap, HashSet};

use agentlens_config::MergePolicy;
use tracing::{debug, warn};

use crate::imports::ImportResolver;
use crate::model::{AgentNode, FileHierarchy, FileScan, HierarchyNode, ImportRecord};
use crate::paths::{from_display, read_source};
use crate::scanner::extract_agents;

/// Directory-wide map from identifier to declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatIndex {
    agents: BTreeMap<String, AgentNode>,
    root: Option<String>,
}

impl FlatIndex {
    /// Merge per-file maps in sorted path order.
    ///
    /// The root is the node named `root_identifier` if any file declares one,
    /// otherwise the root of the first file that declares anything.
    pub fn merge<'a>(
        files: impl IntoIterator<Item = &'a FileScan>,
        policy: MergePolicy,
        root_identifier: &str,
    ) -> Self {
        let mut files: Vec<&FileScan> = files.into_iter().collect();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let mut agents: BTreeMap<String, AgentNode> = BTreeMap::new();
        for file in &files {
            for (identifier, node) in &file.hierarchy.agents {
                match agents.get(identifier) {
                    Some(existing) if policy == MergePolicy::FirstWins => {
                        debug!(
                            identifier,
                            kept = %existing.location.file,
                            ignored = %node.location.file,
                            "duplicate identifier"
                        );
                    }
                    Some(existing) => {
                        debug!(
                            identifier,
                            kept = %node.location.file,
                            replaced = %existing.location.file,
                            "duplicate identifier"
                        );
                        agents.insert(identifier.clone(), node.clone());
                    }
                    None => {
                        agents.insert(identifier.clone(), node.clone());
                    }
                }
            }
        }

        let root = if agents.contains_key(root_identifier) {
            Some(root_identifier.to_string())
        } else {
            files
                .iter()
                .find_map(|file| file.hierarchy.root.as_ref())
                .map(|node| node.identifier.clone())
        };

        Self { agents, root }
    }

    pub fn get(&self, identifier: &str) -> Option<&AgentNode> {
        self.agents.get(identifier)
    }

    /// The directory-wide root declaration.
    pub fn root(&self) -> Option<&AgentNode> {
        self.root.as_deref().and_then(|id| self.agents.get(id))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentNode)> {
        self.agents.iter().map(|(id, node)| (id.as_str(), node))
    }
}

/// A file outside the scanned set, read because an import pointed at it.
#[derive(Debug, Default)]
struct ExternalFile {
    agents: BTreeMap<String, AgentNode>,
    imports: Vec<ImportRecord>,
}

/// Expands declarations into nested trees.
///
/// Lookup order for a sub-agent reference: the flat index, then the import
/// table of the file that owns the node being expanded. Files reached only
/// through imports are read once and cached for the builder's lifetime.
pub struct HierarchyBuilder<'a> {
    index: &'a FlatIndex,
    files: HashMap<&'a str, &'a FileHierarchy>,
    imports: &'a BTreeMap<String, Vec<ImportRecord>>,
    resolver: &'a ImportResolver,
    external: HashMap<String, ExternalFile>,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(
        index: &'a FlatIndex,
        files: &'a [FileScan],
        imports: &'a BTreeMap<String, Vec<ImportRecord>>,
        resolver: &'a ImportResolver,
    ) -> Self {
        Self {
            index,
            files: files
                .iter()
                .map(|file| (file.file_path.as_str(), &file.hierarchy))
                .collect(),
            imports,
            resolver,
            external: HashMap::new(),
        }
    }

    /// Nested tree for the directory-wide root, if there is one.
    pub fn build_root(&mut self) -> Option<HierarchyNode> {
        let root = self.index.root()?.clone();
        Some(self.build(&root))
    }

    /// Nested tree starting at `node`.
    pub fn build(&mut self, node: &AgentNode) -> HierarchyNode {
        let mut path = HashSet::new();
        self.expand(node, false, &mut path)
    }

    /// Nested tree for an identifier in the flat index.
    pub fn build_identifier(&mut self, identifier: &str) -> Option<HierarchyNode> {
        let node = self.index.get(identifier)?.clone();
        Some(self.build(&node))
    }

    fn expand(
        &mut self,
        node: &AgentNode,
        imported: bool,
        path: &mut HashSet<(String, String)>,
    ) -> HierarchyNode {
        let mut out = HierarchyNode::shell(node, imported);
        let key = (node.location.file.clone(), node.identifier.clone());
        path.insert(key.clone());

        for reference in &node.sub_agents {
            let Some(child) = self.lookup(&reference.id, &node.location.file) else {
                out.unresolved.push(reference.id.clone());
                continue;
            };
            if path.contains(&(child.location.file.clone(), child.identifier.clone())) {
                out.cycles.push(reference.id.clone());
                continue;
            }
            let crosses_file = child.location.file != node.location.file;
            out.sub_agents.push(self.expand(&child, crosses_file, path));
        }

        path.remove(&key);
        out
    }

    fn lookup(&mut self, identifier: &str, owner_file: &str) -> Option<AgentNode> {
        if let Some(node) = self.index.get(identifier) {
            return Some(node.clone());
        }

        let record = self
            .import_table(owner_file)
            .iter()
            .find(|record| record.symbol == identifier && record.verified)?
            .clone();

        if let Some(hierarchy) = self.files.get(record.resolved.as_str()) {
            return hierarchy.agents.get(&record.original).cloned();
        }

        self.load_external(&record.resolved)
            .agents
            .get(&record.original)
            .cloned()
    }

    fn import_table(&self, file: &str) -> &[ImportRecord] {
        self.imports
            .get(file)
            .or_else(|| self.external.get(file).map(|external| &external.imports))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn load_external(&mut self, rel: &str) -> &ExternalFile {
        if !self.external.contains_key(rel) {
            let path = from_display(self.resolver.root(), rel);
            let external = match read_source(&path) {
                Ok(text) => ExternalFile {
                    agents: extract_agents(rel, &text)
                        .into_iter()
                        .map(|node| (node.identifier.clone(), node))
                        .collect(),
                    imports: self.resolver.import_table(&path, &text),
                },
                Err(err) => {
                    warn!(file = rel, error = %err, "failed to read imported source file");
                    ExternalFile::default()
                }
            };
            debug!(file = rel, agents = external.agents.len(), "loaded imported file");
            self.external.insert(rel.to_string(), external);
        }
        &self.external[rel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstructorKind, Reference, SourceLocation};
    use agentlens_config::ImportConfig;
    use pretty_assertions::assert_eq;

    fn agent(identifier: &str, file: &str, subs: &[&str]) -> AgentNode {
        AgentNode {
            identifier: identifier.to_string(),
            kind: ConstructorKind::Generic,
            name: Some(identifier.to_string()),
            description: None,
            model: None,
            instruction: None,
            output_key: None,
            sub_agents: subs.iter().map(|s| Reference::agent(*s)).collect(),
            tools: Vec::new(),
            agent_tools: Vec::new(),
            max_iterations: None,
            include_contents: None,
            location: SourceLocation {
                file: file.to_string(),
                line: 1,
            },
        }
    }

    fn file_scan(path: &str, nodes: Vec<AgentNode>) -> FileScan {
        let root = nodes.first().cloned();
        let agents: BTreeMap<_, _> = nodes
            .into_iter()
            .map(|n| (n.identifier.clone(), n))
            .collect();
        FileScan {
            file_path: path.to_string(),
            file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            has_agents: !agents.is_empty(),
            agent_count: agents.len(),
            hierarchy: FileHierarchy { root, agents },
        }
    }

    #[test]
    fn test_merge_first_wins() {
        let files = vec![
            file_scan("b.py", vec![agent("dup", "b.py", &[])]),
            file_scan("a.py", vec![agent("dup", "a.py", &[])]),
        ];
        let index = FlatIndex::merge(&files, MergePolicy::FirstWins, "root_agent");
        assert_eq!(index.get("dup").unwrap().location.file, "a.py");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_merge_last_wins() {
        let files = vec![
            file_scan("a.py", vec![agent("dup", "a.py", &[])]),
            file_scan("b.py", vec![agent("dup", "b.py", &[])]),
        ];
        let index = FlatIndex::merge(&files, MergePolicy::LastWins, "root_agent");
        assert_eq!(index.get("dup").unwrap().location.file, "b.py");
    }

    #[test]
    fn test_merge_root_prefers_reserved_identifier() {
        let files = vec![
            file_scan("a.py", vec![agent("first", "a.py", &[])]),
            file_scan("z.py", vec![agent("root_agent", "z.py", &[])]),
        ];
        let index = FlatIndex::merge(&files, MergePolicy::FirstWins, "root_agent");
        assert_eq!(index.root().unwrap().identifier, "root_agent");
    }

    #[test]
    fn test_merge_root_falls_back_to_first_file() {
        let files = vec![
            file_scan("b.py", vec![agent("from_b", "b.py", &[])]),
            file_scan("a.py", vec![agent("from_a", "a.py", &[]), agent("zzz", "a.py", &[])]),
        ];
        let index = FlatIndex::merge(&files, MergePolicy::FirstWins, "root_agent");
        assert_eq!(index.root().unwrap().identifier, "from_a");
    }

    #[test]
    fn test_merge_empty() {
        let index = FlatIndex::merge(&[], MergePolicy::FirstWins, "root_agent");
        assert!(index.is_empty());
        assert!(index.root().is_none());
    }

    fn builder_fixture(
        files: &[FileScan],
    ) -> (FlatIndex, BTreeMap<String, Vec<ImportRecord>>, ImportResolver) {
        let index = FlatIndex::merge(files, MergePolicy::FirstWins, "root_agent");
        let resolver = ImportResolver::new("/nonexistent-root", ImportConfig::default());
        (index, BTreeMap::new(), resolver)
    }

    #[test]
    fn test_build_nests_and_tags_imported() {
        let files = vec![
            file_scan("a.py", vec![agent("root_agent", "a.py", &["local", "remote"]), agent("local", "a.py", &[])]),
            file_scan("pkg/b.py", vec![agent("remote", "pkg/b.py", &[])]),
        ];
        let (index, imports, resolver) = builder_fixture(&files);
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_root().unwrap();
        assert_eq!(tree.identifier, "root_agent");
        assert!(!tree.imported);
        assert_eq!(tree.sub_agents.len(), 2);
        assert!(!tree.sub_agents[0].imported);
        assert!(tree.sub_agents[1].imported);
        assert_eq!(tree.sub_agents[1].file, "pkg/b.py");
    }

    #[test]
    fn test_build_cycle_is_finite() {
        let files = vec![file_scan(
            "a.py",
            vec![agent("a", "a.py", &["b"]), agent("b", "a.py", &["a"])],
        )];
        let (index, imports, resolver) = builder_fixture(&files);
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_identifier("a").unwrap();
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.sub_agents[0].identifier, "b");
        assert_eq!(tree.sub_agents[0].cycles, vec!["a"]);
    }

    #[test]
    fn test_build_self_reference() {
        let files = vec![file_scan("a.py", vec![agent("loop", "a.py", &["loop"])])];
        let (index, imports, resolver) = builder_fixture(&files);
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_identifier("loop").unwrap();
        assert!(tree.sub_agents.is_empty());
        assert_eq!(tree.cycles, vec!["loop"]);
    }

    #[test]
    fn test_build_diamond_expands_shared_child_on_each_path() {
        let files = vec![file_scan(
            "a.py",
            vec![
                agent("root_agent", "a.py", &["left", "right"]),
                agent("left", "a.py", &["shared"]),
                agent("right", "a.py", &["shared"]),
                agent("shared", "a.py", &[]),
            ],
        )];
        let (index, imports, resolver) = builder_fixture(&files);
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_root().unwrap();
        assert_eq!(tree.node_count(), 5);
        assert!(tree.cycles.is_empty());
    }

    #[test]
    fn test_build_records_unresolved() {
        let files = vec![file_scan("a.py", vec![agent("root_agent", "a.py", &["ghost"])])];
        let (index, imports, resolver) = builder_fixture(&files);
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_root().unwrap();
        assert!(tree.sub_agents.is_empty());
        assert_eq!(tree.unresolved, vec!["ghost"]);
    }

    #[test]
    fn test_build_follows_aliased_import_into_scanned_file() {
        let files = vec![
            file_scan("a.py", vec![agent("root_agent", "a.py", &["helper"])]),
            file_scan("pkg/b.py", vec![agent("helper_agent", "pkg/b.py", &[])]),
        ];
        let index = FlatIndex::merge(&files, MergePolicy::FirstWins, "root_agent");
        let resolver = ImportResolver::new("/nonexistent-root", ImportConfig::default());
        let mut imports = BTreeMap::new();
        imports.insert(
            "a.py".to_string(),
            vec![ImportRecord {
                symbol: "helper".into(),
                original: "helper_agent".into(),
                module: "pkg.b".into(),
                resolved: "pkg/b.py".into(),
                verified: true,
                statement: "from pkg.b import helper_agent as helper".into(),
                line: 1,
            }],
        );
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_root().unwrap();
        assert_eq!(tree.sub_agents[0].identifier, "helper_agent");
        assert!(tree.sub_agents[0].imported);
        assert!(tree.unresolved.is_empty());
    }

    fn verified_import(symbol: &str, original: &str, resolved: &str) -> ImportRecord {
        ImportRecord {
            symbol: symbol.into(),
            original: original.into(),
            module: resolved.trim_end_matches(".py").replace('/', "."),
            resolved: resolved.into(),
            verified: true,
            statement: format!("import {original} as {symbol}"),
            line: 1,
        }
    }

    #[test]
    fn test_build_loads_unscanned_file_with_invalid_utf8() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("lib")).unwrap();
        std::fs::write(
            tmp.path().join("lib/helpers.py"),
            b"# r\xe9sum\xe9\nhelper_agent = Agent(name='h')\n",
        )
        .unwrap();

        let files = vec![file_scan("a.py", vec![agent("root_agent", "a.py", &["helper"])])];
        let index = FlatIndex::merge(&files, MergePolicy::FirstWins, "root_agent");
        let resolver = ImportResolver::new(tmp.path(), ImportConfig::default());
        let mut imports = BTreeMap::new();
        imports.insert(
            "a.py".to_string(),
            vec![verified_import("helper", "helper_agent", "lib/helpers.py")],
        );
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_root().unwrap();
        assert_eq!(tree.sub_agents[0].file, "lib/helpers.py");
        assert_eq!(tree.sub_agents[0].name.as_deref(), Some("h"));
        assert_eq!(tree.sub_agents[0].line, 2);
    }

    #[test]
    fn test_build_missing_imported_file_is_unresolved() {
        let files = vec![file_scan("a.py", vec![agent("root_agent", "a.py", &["helper"])])];
        let index = FlatIndex::merge(&files, MergePolicy::FirstWins, "root_agent");
        let resolver = ImportResolver::new("/nonexistent-root", ImportConfig::default());
        let mut imports = BTreeMap::new();
        imports.insert(
            "a.py".to_string(),
            vec![verified_import("helper", "helper_agent", "lib/gone.py")],
        );
        let mut builder = HierarchyBuilder::new(&index, &files, &imports, &resolver);

        let tree = builder.build_root().unwrap();
        assert!(tree.sub_agents.is_empty());
        assert_eq!(tree.unresolved, vec!["helper"]);
    }
}
