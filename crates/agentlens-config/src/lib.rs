#![deny(unsafe_code)]

//! Configuration loading and validation for agentlens.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure; every section has defaults, so an empty
//! file (or no file at all) is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// How a directory-wide index resolves an identifier declared in more than
/// one file. Files are always merged in sorted path order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The declaration from the lexicographically first file is kept.
    #[default]
    FirstWins,
    /// The declaration from the lexicographically last file is kept.
    LastWins,
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scan and merge behaviour.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Import statement filtering and module path resolution.
    #[serde(default)]
    pub imports: ImportConfig,

    /// Definition lookup settings.
    #[serde(default)]
    pub definition: DefinitionConfig,

    /// Source file discovery (used by the CLI only).
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scan and merge behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Identifier that marks the root agent of a file or directory.
    #[serde(default = "default_root_identifier")]
    pub root_identifier: String,

    /// Duplicate-identifier policy: "first-wins" or "last-wins".
    #[serde(default = "default_merge_policy")]
    pub merge_policy: String,

    /// Maximum number of files read concurrently during a directory scan.
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_identifier: default_root_identifier(),
            merge_policy: default_merge_policy(),
            max_concurrent_reads: default_max_concurrent_reads(),
        }
    }
}

fn default_root_identifier() -> String {
    "root_agent".to_string()
}

fn default_merge_policy() -> String {
    "first-wins".to_string()
}

fn default_max_concurrent_reads() -> usize {
    16
}

/// Import statement filtering and module path resolution.
///
/// ## TOML Example
///
/// ```toml
/// [imports]
/// relevance_terms = ["agent", "tool"]
/// package_entry = "agent.py"
///
/// [[imports.legacy_prefixes]]
/// dir = "travel"
///
/// [[imports.legacy_prefixes]]
/// dir = "travel/travel_concierge"
/// strip_components = 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Substrings (case-insensitive) that mark an import as agent/tool related.
    #[serde(default = "default_relevance_terms")]
    pub relevance_terms: Vec<String>,

    /// Conventional entry file tried when a module path names a package directory.
    #[serde(default = "default_package_entry")]
    pub package_entry: String,

    /// Project-specific directories tried last when resolving absolute imports.
    #[serde(default)]
    pub legacy_prefixes: Vec<LegacyPrefix>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            relevance_terms: default_relevance_terms(),
            package_entry: default_package_entry(),
            legacy_prefixes: Vec::new(),
        }
    }
}

fn default_relevance_terms() -> Vec<String> {
    ["agent", "tool", "util", "helper"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_package_entry() -> String {
    "agent.py".to_string()
}

/// A directory prefix under the scan root where absolute imports may live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPrefix {
    /// Directory relative to the scan root, `/`-separated.
    pub dir: String,

    /// Number of leading module components to drop before joining.
    #[serde(default)]
    pub strip_components: usize,
}

/// Definition lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionConfig {
    /// Lines of context shown before a definition.
    #[serde(default = "default_context_before")]
    pub context_before: usize,

    /// Lines of context shown after an agent definition.
    #[serde(default = "default_agent_context_after")]
    pub agent_context_after: usize,

    /// Lines of context shown after a tool definition.
    #[serde(default = "default_tool_context_after")]
    pub tool_context_after: usize,
}

impl Default for DefinitionConfig {
    fn default() -> Self {
        Self {
            context_before: default_context_before(),
            agent_context_after: default_agent_context_after(),
            tool_context_after: default_tool_context_after(),
        }
    }
}

fn default_context_before() -> usize {
    2
}

fn default_agent_context_after() -> usize {
    2
}

fn default_tool_context_after() -> usize {
    4
}

/// Source file discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// File extensions (without the dot) that are handed to the scanner.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names skipped anywhere in the tree.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["py".to_string()]
}

fn default_exclude_dirs() -> Vec<String> {
    ["venv", ".venv", "__pycache__", ".git", "node_modules"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), bytes = content.len(), "loaded config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.scan.root_identifier) {
            return Err(ConfigError::Validation(format!(
                "scan.root_identifier must be a valid identifier, got {:?}",
                self.scan.root_identifier
            )));
        }
        let valid_policies = ["first-wins", "last-wins"];
        if !valid_policies.contains(&self.scan.merge_policy.as_str()) {
            return Err(ConfigError::Validation(format!(
                "scan.merge_policy must be one of {:?}, got {:?}",
                valid_policies, self.scan.merge_policy
            )));
        }
        if self.scan.max_concurrent_reads == 0 {
            return Err(ConfigError::Validation(
                "scan.max_concurrent_reads must be at least 1".to_string(),
            ));
        }

        for (i, term) in self.imports.relevance_terms.iter().enumerate() {
            if term.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "imports.relevance_terms[{i}] must not be empty"
                )));
            }
        }
        if self.imports.package_entry.is_empty()
            || self.imports.package_entry.contains(['/', '\\'])
        {
            return Err(ConfigError::Validation(format!(
                "imports.package_entry must be a bare file name, got {:?}",
                self.imports.package_entry
            )));
        }
        for (i, prefix) in self.imports.legacy_prefixes.iter().enumerate() {
            if prefix.dir.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "imports.legacy_prefixes[{i}].dir must not be empty"
                )));
            }
            if Path::new(&prefix.dir).is_absolute() || prefix.dir.split('/').any(|c| c == "..") {
                return Err(ConfigError::Validation(format!(
                    "imports.legacy_prefixes[{i}].dir must stay inside the scan root, got {:?}",
                    prefix.dir
                )));
            }
        }

        if self.discovery.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "discovery.extensions must list at least one extension".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }

    /// The configured merge policy. Assumes the config has been validated.
    pub fn merge_policy(&self) -> MergePolicy {
        if self.scan.merge_policy == "last-wins" {
            MergePolicy::LastWins
        } else {
            MergePolicy::FirstWins
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
