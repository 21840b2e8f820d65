#![deny(unsafe_code)]

//! Shared test utilities for the agentlens workspace.
//!
//! Provides temporary source trees, config builders, and tracing helpers so
//! that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! agentlens-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fixture;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use fixture::FixtureTree;
pub use tracing_setup::init_test_tracing;
