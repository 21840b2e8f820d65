//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use agentlens_config::{AppConfig, LegacyPrefix};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .merge_policy("last-wins")
///     .legacy_prefix("travel", 0)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn root_identifier(mut self, identifier: &str) -> Self {
        self.config.scan.root_identifier = identifier.to_string();
        self
    }

    pub fn merge_policy(mut self, policy: &str) -> Self {
        self.config.scan.merge_policy = policy.to_string();
        self
    }

    pub fn max_concurrent_reads(mut self, n: usize) -> Self {
        self.config.scan.max_concurrent_reads = n;
        self
    }

    pub fn relevance_terms(mut self, terms: &[&str]) -> Self {
        self.config.imports.relevance_terms = terms.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn package_entry(mut self, entry: &str) -> Self {
        self.config.imports.package_entry = entry.to_string();
        self
    }

    pub fn legacy_prefix(mut self, dir: &str, strip_components: usize) -> Self {
        self.config.imports.legacy_prefixes.push(LegacyPrefix {
            dir: dir.to_string(),
            strip_components,
        });
        self
    }

    pub fn tool_context_after(mut self, lines: usize) -> Self {
        self.config.definition.tool_context_after = lines;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
