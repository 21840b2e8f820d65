//! Temporary source trees for scan tests.
//!
//! A [`FixtureTree`] owns a temp directory that acts as the scan root. Files
//! are written with root-relative paths; the directory is deleted when the
//! fixture is dropped, even on panic.

use std::path::{Path, PathBuf};

use agentlens_config::AppConfig;
use agentlens_core::{DirectoryScan, Scanner};
use tempfile::TempDir;

/// A test-scoped scan root.
pub struct FixtureTree {
    root: PathBuf,
    _temp_dir: TempDir,
}

impl FixtureTree {
    /// An empty tree.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        Self {
            root: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        }
    }

    /// A small multi-file project: a root agent in `agent.py`, sub-agents in a
    /// package reached through imports, and a tool module.
    pub fn sample_project() -> Self {
        let tree = Self::new();
        tree.write(
            "agent.py",
            r#"from concierge.sub_agents.planning.agent import planning_agent
from concierge.sub_agents.booking import booking_agent
from concierge.tools.search import google_search

root_agent = LlmAgent(
    name="root_agent",
    model="gemini-2.0-flash",
    description="A travel concierge",
    instruction=prompt.ROOT_AGENT_INSTR,
    sub_agents=[
        planning_agent,  # itinerary work
        booking_agent,
    ],
    tools=[google_search, AgentTool(agent=weather_agent)],
)

weather_agent = Agent(
    name="weather_agent",
    model=MODEL,
    output_key="forecast",
)
"#,
        );
        tree.write(
            "concierge/sub_agents/planning/agent.py",
            r#"planning_agent = SequentialAgent(
    name="planning_agent",
    description="""
        Plans the trip.
    """,
    sub_agents=[draft_agent, review_loop],
)

draft_agent = LlmAgent(name="draft_agent", instruction="Draft an itinerary")

review_loop = LoopAgent(
    name="review_loop",
    max_iterations=3,
    sub_agents=[draft_agent],
)
"#,
        );
        tree.write(
            "concierge/sub_agents/booking/agent.py",
            "booking_agent = Agent(\n    name='booking_agent',\n    include_contents='none',\n)\n",
        );
        tree.write(
            "concierge/tools/search.py",
            "def google_search(query: str) -> list:\n    return []\n",
        );
        tree
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `text` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture directory");
        }
        std::fs::write(&path, text).expect("failed to write fixture file");
        path
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.root.join(rel)).expect("failed to remove fixture file");
    }

    /// Every `.py` file in the tree, sorted.
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(&self.root)
            .hidden(false)
            .build()
            .map(|entry| entry.expect("failed to walk fixture tree"))
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|path| path.extension().is_some_and(|ext| ext == "py"))
            .collect();
        files.sort();
        files
    }

    /// A scanner rooted at this tree.
    pub fn scanner(&self, config: AppConfig) -> Scanner {
        Scanner::new(&self.root, config).expect("fixture root is a directory")
    }

    /// Scan every source file in the tree with `config`.
    pub async fn scan(&self, config: AppConfig) -> (Scanner, DirectoryScan) {
        let scanner = self.scanner(config);
        let scan = scanner
            .scan(self.source_files())
            .await
            .expect("fixture scan failed");
        (scanner, scan)
    }

    /// Write an `agentlens.toml` into the tree and load it.
    pub async fn write_config(&self, toml_content: &str) -> (PathBuf, AppConfig) {
        let path = self.root.join("agentlens.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        let config = AppConfig::load(&path)
            .await
            .expect("failed to parse test config");
        (path, config)
    }
}

impl Default for FixtureTree {
    fn default() -> Self {
        Self::new()
    }
}
