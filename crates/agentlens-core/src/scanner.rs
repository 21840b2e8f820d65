//! Directory scanning.
//!
//! [`Scanner`] runs the per-file pipeline (locate, extract, classify, import
//! table) over a caller-supplied list of files, concurrently and bounded by
//! `scan.max_concurrent_reads`, then merges the results in sorted path order
//! so repeated scans of an unchanged tree produce identical output.

use std::collections::BTreeMap;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentlens_config::AppConfig;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::definition::{DefinitionLocation, DefinitionLocator, QueryKind, ToolLocation};
use crate::fields;
use crate::hierarchy::{FlatIndex, HierarchyBuilder};
use crate::imports::ImportResolver;
use crate::locator::locate;
use crate::model::{
    AgentNode, FileHierarchy, FileScan, HierarchyNode, ImportRecord, NestedFile, NestedScanResult,
    ScanResult, SourceLocation,
};
use crate::paths::{display_path, file_name, read_source};

/// Errors that abort a scan. Per-file problems never do.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan root does not exist: {0}")]
    InvalidRoot(PathBuf),

    #[error("scan root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("scan interrupted before all files were read")]
    Interrupted,
}

/// Every declaration in `text`, in source order.
pub fn extract_agents(file: &str, text: &str) -> Vec<AgentNode> {
    locate(text)
        .into_iter()
        .map(|construct| {
            let fields = fields::extract(construct.block);
            let refs = classify(&fields.tools, &fields.sub_agents);
            AgentNode {
                identifier: construct.identifier.to_string(),
                kind: construct.kind,
                name: fields.name,
                description: fields.description,
                model: fields.model,
                instruction: fields.instruction,
                output_key: fields.output_key,
                sub_agents: refs.sub_agents,
                tools: refs.tools,
                agent_tools: refs.agent_tools,
                max_iterations: fields.max_iterations,
                include_contents: fields.include_contents,
                location: SourceLocation {
                    file: file.to_string(),
                    line: construct.line,
                },
            }
        })
        .collect()
}

/// Flat per-file map. A later declaration of the same identifier replaces
/// an earlier one; the file root is `root_identifier` if declared, else the
/// first declaration in source order.
pub fn analyze_file(file_path: &str, text: &str, root_identifier: &str) -> FileScan {
    let agents = extract_agents(file_path, text);
    let first = agents.first().map(|node| node.identifier.clone());
    let agents: BTreeMap<String, AgentNode> = agents
        .into_iter()
        .map(|node| (node.identifier.clone(), node))
        .collect();
    let root = agents
        .get(root_identifier)
        .or_else(|| first.as_deref().and_then(|id| agents.get(id)))
        .cloned();

    FileScan {
        file_path: file_path.to_string(),
        file_name: file_name(Path::new(file_path)),
        has_agents: !agents.is_empty(),
        agent_count: agents.len(),
        hierarchy: FileHierarchy { root, agents },
    }
}

/// Flat scan output plus the per-file import tables the nested view needs.
#[derive(Debug, Clone)]
pub struct DirectoryScan {
    pub result: ScanResult,
    /// Relevant imports keyed by root-relative file path.
    pub imports: BTreeMap<String, Vec<ImportRecord>>,
}

struct FileOutcome {
    display: String,
    analysis: io::Result<(FileScan, Vec<ImportRecord>)>,
}

/// Run one file's work, turning a panic into a per-file failure.
fn isolate<T>(work: impl FnOnce() -> io::Result<T>) -> io::Result<T> {
    std::panic::catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|_| Err(io::Error::other("file analysis panicked")))
}

/// Scans source files under one root directory.
#[derive(Debug)]
pub struct Scanner {
    root: PathBuf,
    config: AppConfig,
    resolver: Arc<ImportResolver>,
}

impl Scanner {
    /// Create a scanner. Fails if `root` is missing or not a directory.
    pub fn new(root: impl Into<PathBuf>, config: AppConfig) -> Result<Self, ScanError> {
        let root = root.into();
        if !root.exists() {
            return Err(ScanError::InvalidRoot(root));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }
        let resolver = Arc::new(ImportResolver::new(&root, config.imports.clone()));
        Ok(Self {
            root,
            config,
            resolver,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ImportResolver {
        &self.resolver
    }

    /// Scan `files` (absolute, or relative to the root).
    ///
    /// Dropping the returned future aborts the outstanding per-file tasks.
    pub async fn scan(&self, files: Vec<PathBuf>) -> Result<DirectoryScan, ScanError> {
        let semaphore = Arc::new(Semaphore::new(self.config.scan.max_concurrent_reads.max(1)));
        let mut tasks = JoinSet::new();

        for file in files {
            let path = if file.is_absolute() {
                file
            } else {
                self.root.join(file)
            };
            let display = display_path(&self.root, &path);
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| ScanError::Interrupted)?;
            let resolver = Arc::clone(&self.resolver);
            let root_identifier = self.config.scan.root_identifier.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let analysis = isolate(|| {
                    let text = read_source(&path)?;
                    let scan = analyze_file(&display, &text, &root_identifier);
                    let imports = resolver.import_table(&path, &text);
                    Ok((scan, imports))
                });
                FileOutcome { display, analysis }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(error = %err, "scan task did not complete"),
            }
        }

        Ok(self.assemble(outcomes))
    }

    fn assemble(&self, mut outcomes: Vec<FileOutcome>) -> DirectoryScan {
        outcomes.sort_by(|a, b| a.display.cmp(&b.display));
        outcomes.dedup_by(|a, b| a.display == b.display);

        let mut total_files = 0;
        let mut total_agents = 0;
        let mut files = Vec::new();
        let mut unreadable_files = Vec::new();
        let mut imports = BTreeMap::new();

        for outcome in outcomes {
            match outcome.analysis {
                Ok((scan, records)) => {
                    total_files += 1;
                    if !records.is_empty() {
                        imports.insert(outcome.display.clone(), records);
                    }
                    if scan.has_agents {
                        debug!(file = %outcome.display, agents = scan.agent_count, "found agents");
                        total_agents += scan.agent_count;
                        files.push(scan);
                    }
                }
                Err(err) => {
                    warn!(file = %outcome.display, error = %err, "failed to read source file");
                    unreadable_files.push(outcome.display);
                }
            }
        }

        info!(
            root = %self.root.display(),
            total_files,
            files_with_agents = files.len(),
            total_agents,
            unreadable = unreadable_files.len(),
            "scan complete"
        );

        DirectoryScan {
            result: ScanResult {
                scan_time: Utc::now(),
                total_files,
                files_with_agents: files.len(),
                total_agents,
                unreadable_files,
                files,
            },
            imports,
        }
    }

    /// Directory-wide flat index under the configured merge policy.
    pub fn index(&self, scan: &DirectoryScan) -> FlatIndex {
        FlatIndex::merge(
            &scan.result.files,
            self.config.merge_policy(),
            &self.config.scan.root_identifier,
        )
    }

    /// Nested view: each file's root expanded into a tree.
    pub fn nested(&self, scan: &DirectoryScan) -> NestedScanResult {
        let index = self.index(scan);
        let mut builder =
            HierarchyBuilder::new(&index, &scan.result.files, &scan.imports, &self.resolver);

        let files = scan
            .result
            .files
            .iter()
            .map(|file| NestedFile {
                file_path: file.file_path.clone(),
                file_name: file.file_name.clone(),
                has_agents: file.has_agents,
                agent_count: file.agent_count,
                hierarchy: file.hierarchy.root.as_ref().map(|root| builder.build(root)),
            })
            .collect();

        NestedScanResult {
            scan_time: scan.result.scan_time,
            total_files: scan.result.total_files,
            files_with_agents: scan.result.files_with_agents,
            total_agents: scan.result.total_agents,
            unreadable_files: scan.result.unreadable_files.clone(),
            files,
        }
    }

    /// Nested tree for the directory-wide root.
    pub fn hierarchy(&self, scan: &DirectoryScan) -> Option<HierarchyNode> {
        let index = self.index(scan);
        HierarchyBuilder::new(&index, &scan.result.files, &scan.imports, &self.resolver).build_root()
    }

    /// Where `identifier` is defined, as seen from `file` (root-relative).
    pub fn locate_definition(
        &self,
        file: &str,
        identifier: &str,
        kind: QueryKind,
    ) -> DefinitionLocation {
        DefinitionLocator::new(&self.resolver, &self.config.definition).locate(file, identifier, kind)
    }

    /// Tools of `agent` as seen from `file`, each with its definition site.
    pub fn agent_tools(&self, file: &str, agent: &str) -> Vec<ToolLocation> {
        DefinitionLocator::new(&self.resolver, &self.config.definition).agent_tools(file, agent)
    }
}
