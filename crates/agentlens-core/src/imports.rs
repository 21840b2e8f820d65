//! Cross-file import parsing and module path resolution.
//!
//! Only `from <module> import <symbols>` statements are considered. A
//! statement is kept when its module path or one of its symbols mentions a
//! configured relevance term; each symbol becomes one [`ImportRecord`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use agentlens_config::ImportConfig;
use regex::Regex;
use tracing::debug;

use crate::brackets::{line_at, matching_close, split_top_level};
use crate::model::ImportRecord;
use crate::paths::{display_path, join_module, module_file};

static FROM_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*from[ \t]+(\.+[\w.]*|[A-Za-z_][\w.]*)[ \t]+import[ \t]+(.*)$")
        .expect("import pattern is valid")
});

/// One bound symbol of an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSymbol {
    /// Name in the source module.
    pub original: String,
    /// Name bound in the importing file.
    pub bound: String,
}

/// A parsed `from ... import ...` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub module: String,
    pub symbols: Vec<ImportedSymbol>,
    /// The statement as written, including a parenthesized symbol list.
    pub statement: String,
    pub line: u32,
}

/// Parse every `from` import in `text`, in source order.
pub fn parse_imports(text: &str) -> Vec<ImportStatement> {
    let mut statements = Vec::new();

    for caps in FROM_IMPORT_RE.captures_iter(text) {
        let (Some(whole), Some(module), Some(rest)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let rest_text = rest.as_str().trim_start();

        let (symbol_text, statement) = if rest_text.starts_with('(') {
            let open = rest.end() - rest_text.len();
            let Some(close) = matching_close(text, open) else {
                debug!(line = line_at(text, whole.start()), "unterminated import list");
                continue;
            };
            let inner: Vec<&str> = text[open + 1..close].lines().map(strip_comment).collect();
            (inner.join("\n"), &text[whole.start()..=close])
        } else {
            (strip_comment(rest_text).to_string(), whole.as_str())
        };

        let symbols: Vec<ImportedSymbol> = split_top_level(&symbol_text)
            .into_iter()
            .filter_map(parse_symbol)
            .collect();
        if symbols.is_empty() {
            continue;
        }

        statements.push(ImportStatement {
            module: module.as_str().to_string(),
            symbols,
            statement: statement.trim().to_string(),
            line: line_at(text, whole.start()),
        });
    }

    statements
}

fn strip_comment(line: &str) -> &str {
    line.find('#').map_or(line, |at| &line[..at])
}

/// `name` or `name as alias`. Wildcards and malformed entries yield nothing.
fn parse_symbol(entry: &str) -> Option<ImportedSymbol> {
    let words: Vec<&str> = entry.split_whitespace().collect();
    let (original, bound) = match words.as_slice() {
        [name] => (*name, *name),
        [name, "as", alias] => (*name, *alias),
        _ => return None,
    };
    let valid = |s: &str| {
        s.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
            && s.chars().all(|c| c.is_alphanumeric() || c == '_')
    };
    (valid(original) && valid(bound)).then(|| ImportedSymbol {
        original: original.to_string(),
        bound: bound.to_string(),
    })
}

/// Whether an import mentions any of `terms`, case-insensitively.
pub fn is_relevant(module: &str, symbol: &ImportedSymbol, terms: &[String]) -> bool {
    let haystacks = [
        module.to_lowercase(),
        symbol.original.to_lowercase(),
        symbol.bound.to_lowercase(),
    ];
    terms.iter().any(|term| {
        let term = term.to_lowercase();
        haystacks.iter().any(|h| h.contains(&term))
    })
}

/// Outcome of resolving one module path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    /// False when no candidate existed and `path` is only the naive guess.
    pub verified: bool,
}

/// Resolves dotted module paths to files under a scan root.
///
/// Existence checks are cached per (module, importing directory) pair for
/// the lifetime of the resolver.
#[derive(Debug)]
pub struct ImportResolver {
    root: PathBuf,
    config: ImportConfig,
    cache: Mutex<HashMap<(String, PathBuf), Resolution>>,
}

impl ImportResolver {
    pub fn new(root: impl Into<PathBuf>, config: ImportConfig) -> Self {
        Self {
            root: root.into(),
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `module` as imported from a file in `importing_dir`.
    pub fn resolve(&self, module: &str, importing_dir: &Path) -> Resolution {
        let key = (module.to_string(), importing_dir.to_path_buf());
        if let Ok(cache) = self.cache.lock()
            && let Some(hit) = cache.get(&key)
        {
            return hit.clone();
        }

        let (candidates, guess) = self.candidates(module, importing_dir);
        let resolution = match candidates.into_iter().find(|c| c.is_file()) {
            Some(path) => Resolution {
                path,
                verified: true,
            },
            None => Resolution {
                path: guess,
                verified: false,
            },
        };
        debug!(
            module,
            resolved = %resolution.path.display(),
            verified = resolution.verified,
            "resolved import"
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, resolution.clone());
        }
        resolution
    }

    /// Candidate files in priority order, plus the naive fallback guess.
    fn candidates(&self, module: &str, importing_dir: &Path) -> (Vec<PathBuf>, PathBuf) {
        let dots = module.bytes().take_while(|&b| b == b'.').count();
        let components: Vec<&str> = module[dots..].split('.').filter(|c| !c.is_empty()).collect();
        let mut candidates = Vec::new();

        if dots > 0 {
            let mut base = importing_dir.to_path_buf();
            for _ in 1..dots {
                if let Some(parent) = base.parent() {
                    base = parent.to_path_buf();
                }
            }
            self.push_module_candidates(&mut candidates, &base, &components);
            return (candidates, module_file(&base, &components));
        }

        self.push_module_candidates(&mut candidates, &self.root, &components);

        for ancestor in importing_dir.ancestors() {
            if !ancestor.starts_with(&self.root) || ancestor == self.root {
                break;
            }
            self.push_module_candidates(&mut candidates, ancestor, &components);
        }

        for prefix in &self.config.legacy_prefixes {
            let base = prefix
                .dir
                .split('/')
                .filter(|c| !c.is_empty())
                .fold(self.root.clone(), |acc, part| acc.join(part));
            let stripped = components.get(prefix.strip_components..).unwrap_or(&[]);
            if !stripped.is_empty() {
                self.push_module_candidates(&mut candidates, &base, stripped);
            }
        }

        (candidates, module_file(&self.root, &components))
    }

    /// `base/a/b.py`, then the package entry and `__init__.py` of `base/a/b/`.
    fn push_module_candidates(&self, out: &mut Vec<PathBuf>, base: &Path, components: &[&str]) {
        if !components.is_empty() {
            out.push(module_file(base, components));
        }
        let package = join_module(base, components);
        out.push(package.join(&self.config.package_entry));
        out.push(package.join("__init__.py"));
    }

    /// Relevant import records of one file. `file` is an absolute path.
    pub fn import_table(&self, file: &Path, text: &str) -> Vec<ImportRecord> {
        let importing_dir = file.parent().unwrap_or(self.root.as_path());
        let mut records = Vec::new();

        for statement in parse_imports(text) {
            for symbol in &statement.symbols {
                if !is_relevant(&statement.module, symbol, &self.config.relevance_terms) {
                    continue;
                }
                let resolution = self.resolve(&statement.module, importing_dir);
                records.push(ImportRecord {
                    symbol: symbol.bound.clone(),
                    original: symbol.original.clone(),
                    module: statement.module.clone(),
                    resolved: display_path(&self.root, &resolution.path),
                    verified: resolution.verified,
                    statement: statement.statement.clone(),
                    line: statement.line,
                });
            }
        }

        records
    }
}
