//! repowatch: change feeds for Debian-style package repositories
//!
//! This crate provides:
//! - Lenient parsing of `Packages` control listings
//! - Per-name deduplication with a pluggable version order
//! - Baseline and first-seen ledger persistence (SQLite, JSON, memory)
//! - Differencing into a capped, newest-first change feed

pub mod config;
pub mod control;
pub mod db;
pub mod engine;
pub mod error;
pub mod index;
pub mod json_store;
pub mod ledger;
pub mod models;
pub mod report;
pub mod schema;
pub mod store;
pub mod version;

pub use config::EngineConfig;
pub use control::{parse_control, parse_packages};
pub use db::StateDatabase;
pub use engine::{CompactionSummary, DiffEngine, DiffOutcome};
pub use error::{Error, Result};
pub use index::{IndexBuilder, PackageIndex};
pub use json_store::JsonStateFile;
pub use ledger::TimestampLedger;
pub use models::*;
pub use report::ScopeReport;
pub use store::{LedgerStore, MemoryStore, StateStore};
pub use version::{DebianOrder, Lexicographic, VersionOrder, VersionScheme};
