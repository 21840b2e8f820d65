#![deny(unsafe_code)]

//! agentlens CLI: scan a source tree for agent declarations.

mod discover;

use std::path::{Path, PathBuf};

use agentlens_config::AppConfig;
use agentlens_core::paths::display_path;
use agentlens_core::{DiagnosticCollector, DiagnosticReader, QueryKind, Scanner};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Capacity of the diagnostics ring buffer shown after a scan.
const DIAGNOSTIC_CAPACITY: usize = 256;

/// agentlens: static structure of ADK-style agent code.
#[derive(Parser)]
#[command(name = "agentlens", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "agentlens.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print JSON on a single line.
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flat scan: every declaration, per file.
    Scan {
        /// Directory to scan.
        root: PathBuf,
    },

    /// Nested scan: each file's root expanded into a tree.
    Tree {
        /// Directory to scan.
        root: PathBuf,
    },

    /// Find where an identifier is defined, as seen from one file.
    Find {
        /// Scan root.
        root: PathBuf,
        /// File the identifier is used in (relative to the root).
        file: PathBuf,
        /// Identifier to look up.
        identifier: String,
        /// Look up a tool (function or assignment) instead of an agent.
        #[arg(long)]
        tool: bool,
    },

    /// List an agent's tools and where each one is defined.
    Tools {
        /// Scan root.
        root: PathBuf,
        /// File the agent is used in (relative to the root).
        file: PathBuf,
        /// Agent identifier.
        agent: String,
    },

    /// Show the agent and tool imports of one file.
    Imports {
        /// Scan root.
        root: PathBuf,
        /// File to inspect (relative to the root).
        file: PathBuf,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;
    let diagnostics = init_tracing(cli.verbose, &config);

    match cli.command {
        Commands::Scan { root } => cmd_scan(&root, config, cli.compact, &diagnostics).await?,
        Commands::Tree { root } => cmd_tree(&root, config, cli.compact, &diagnostics).await?,
        Commands::Find {
            root,
            file,
            identifier,
            tool,
        } => cmd_find(&root, &file, &identifier, tool, config, cli.compact)?,
        Commands::Tools { root, file, agent } => {
            cmd_tools(&root, &file, &agent, config, cli.compact)?
        }
        Commands::Imports { root, file } => cmd_imports(&root, &file, config, cli.compact).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

/// Install the fmt subscriber and the diagnostics collector.
///
/// `RUST_LOG` wins; otherwise `-v` raises the configured level.
fn init_tracing(verbose: u8, config: &AppConfig) -> DiagnosticReader {
    let filter = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let collector = DiagnosticCollector::new(DIAGNOSTIC_CAPACITY);
    let reader = collector.reader();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(collector)
        .init();

    reader
}

async fn cmd_scan(
    root: &Path,
    config: AppConfig,
    compact: bool,
    diagnostics: &DiagnosticReader,
) -> Result<()> {
    let files = discover::discover(root, &config.discovery);
    let scanner = Scanner::new(root, config)?;
    let scan = scanner.scan(files).await?;

    print_json(&scan.result, compact)?;
    report_diagnostics(diagnostics);
    Ok(())
}

async fn cmd_tree(
    root: &Path,
    config: AppConfig,
    compact: bool,
    diagnostics: &DiagnosticReader,
) -> Result<()> {
    let files = discover::discover(root, &config.discovery);
    let scanner = Scanner::new(root, config)?;
    let scan = scanner.scan(files).await?;

    print_json(&scanner.nested(&scan), compact)?;
    report_diagnostics(diagnostics);
    Ok(())
}

fn cmd_find(
    root: &Path,
    file: &Path,
    identifier: &str,
    tool: bool,
    config: AppConfig,
    compact: bool,
) -> Result<()> {
    let scanner = Scanner::new(root, config)?;
    let kind = if tool { QueryKind::Tool } else { QueryKind::Agent };
    let location = scanner.locate_definition(&display_path(root, file), identifier, kind);

    print_json(&location, compact)
}

fn cmd_tools(root: &Path, file: &Path, agent: &str, config: AppConfig, compact: bool) -> Result<()> {
    let scanner = Scanner::new(root, config)?;
    let tools = scanner.agent_tools(&display_path(root, file), agent);
    if tools.is_empty() {
        info!(agent, "no tools found");
    }

    print_json(&tools, compact)
}

async fn cmd_imports(root: &Path, file: &Path, config: AppConfig, compact: bool) -> Result<()> {
    let scanner = Scanner::new(root, config)?;
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    print_json(&scanner.resolver().import_table(&path, &text), compact)
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{json}");
    Ok(())
}

fn report_diagnostics(diagnostics: &DiagnosticReader) {
    let entries = diagnostics.entries();
    if entries.is_empty() {
        return;
    }
    eprintln!("{} warning(s) during scan:", entries.len() + diagnostics.dropped());
    for entry in entries {
        match entry.file {
            Some(file) => eprintln!("  {file}: {}", entry.message),
            None => eprintln!("  {}", entry.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_find_with_tool_flag() {
        let cli = Cli::try_parse_from([
            "agentlens", "--compact", "find", "proj", "agent.py", "search", "--tool",
        ])
        .unwrap();
        assert!(cli.compact);
        match cli.command {
            Commands::Find {
                identifier, tool, ..
            } => {
                assert_eq!(identifier, "search");
                assert!(tool);
            }
            _ => panic!("expected find"),
        }
    }

    #[test]
    fn test_parse_tools_command() {
        let cli = Cli::try_parse_from(["agentlens", "tools", "proj", "agent.py", "root_agent"])
            .unwrap();
        match cli.command {
            Commands::Tools { file, agent, .. } => {
                assert_eq!(file, PathBuf::from("agent.py"));
                assert_eq!(agent, "root_agent");
            }
            _ => panic!("expected tools"),
        }
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["agentlens", "scan", "."]).unwrap();
        assert_eq!(cli.config, PathBuf::from("agentlens.toml"));
        assert_eq!(cli.verbose, 0);
        assert!(!cli.compact);
    }

    #[test_log::test(tokio::test)]
    async fn test_load_config_missing_file_uses_defaults() {
        let config = load_config(Path::new("/definitely/missing/agentlens.toml"))
            .await
            .unwrap();
        assert_eq!(config.scan.root_identifier, "root_agent");
    }

    #[test_log::test(tokio::test)]
    async fn test_load_config_from_fixture() {
        let tree = agentlens_test_utils::FixtureTree::new();
        let (path, _) = tree.write_config("[logging]\nlevel = \"debug\"\n").await;
        let config = load_config(&path).await.unwrap();
        assert_eq!(config.logging.level, "debug");
    }
}
