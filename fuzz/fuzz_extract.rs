//! Fuzz target for declaration extraction and import parsing.
//!
//! Run with: cargo +nightly fuzz run fuzz_extract
//!
//! Feeds arbitrary text through the locator, field extractor, classifier
//! and import parser. Unbalanced brackets, stray quotes and multi-byte
//! characters must degrade to partial output, never a panic.

#![no_main]

use agentlens_core::{brackets, imports, scanner};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let scan = scanner::analyze_file("fuzz.py", text, "root_agent");
    assert_eq!(scan.agent_count, scan.hierarchy.agents.len());
    if scan.has_agents {
        assert!(scan.hierarchy.root.is_some());
    }

    for statement in imports::parse_imports(text) {
        assert!(!statement.symbols.is_empty());
    }

    for part in brackets::split_top_level(text) {
        assert!(!part.is_empty());
    }
});
