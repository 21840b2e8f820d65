//! Source file discovery.
//!
//! Walks the scan root with `ignore` (so `.gitignore` rules apply), skips
//! the configured directory names at any depth, and keeps files whose
//! extension is listed in `[discovery] extensions`.

use std::path::{Path, PathBuf};

use agentlens_config::DiscoveryConfig;
use tracing::{debug, warn};

/// Every eligible source file under `root`, sorted.
pub fn discover(root: &Path, config: &DiscoveryConfig) -> Vec<PathBuf> {
    let exclude_dirs = config.exclude_dirs.clone();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir
                && entry.depth() > 0
                && exclude_dirs
                    .iter()
                    .any(|name| entry.file_name() == name.as_str()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let eligible = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| config.extensions.iter().any(|e| e == ext));
        if eligible {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    debug!(root = %root.display(), files = files.len(), "discovered source files");
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn relative(root: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_discover_filters_extensions_and_excludes() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "agent.py");
        touch(tmp.path(), "README.md");
        touch(tmp.path(), "pkg/sub/agent.py");
        touch(tmp.path(), ".venv/lib/site.py");
        touch(tmp.path(), "pkg/__pycache__/agent.py");
        touch(tmp.path(), "node_modules/x.py");

        let files = discover(tmp.path(), &DiscoveryConfig::default());
        assert_eq!(relative(tmp.path(), files), vec!["agent.py", "pkg/sub/agent.py"]);
    }

    #[test]
    fn test_discover_custom_extensions() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.py");
        touch(tmp.path(), "b.pyi");

        let config = DiscoveryConfig {
            extensions: vec!["pyi".to_string()],
            exclude_dirs: Vec::new(),
        };
        assert_eq!(relative(tmp.path(), discover(tmp.path(), &config)), vec!["b.pyi"]);
    }

    #[test]
    fn test_discover_root_named_like_excluded_dir() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "venv/a.py");

        let files = discover(&tmp.path().join("venv"), &DiscoveryConfig::default());
        assert_eq!(files.len(), 1);
    }
}
