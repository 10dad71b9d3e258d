#![deny(unsafe_code)]

//! Shared test utilities for the CivicBridge workspace.
//!
//! Provides scripted providers, catalog fixtures, history sinks, config
//! builders, and tracing helpers so that individual crate tests stay concise
//! and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! civicbridge-test-utils = { workspace = true }
//! ```

pub mod catalog;
pub mod config;
pub mod history;
pub mod providers;
pub mod tracing_setup;

pub use catalog::{FailingCatalog, sample_catalog, sample_origin};
pub use config::TestConfigBuilder;
pub use history::{FailingHistory, TempHistory};
pub use providers::ScriptedProvider;
pub use tracing_setup::init_test_tracing;
