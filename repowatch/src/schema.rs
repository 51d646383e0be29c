//! SQLite schema definitions

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create the database schema
pub const CREATE_SCHEMA: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    version INTEGER PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    description TEXT
);

-- Last-seen version of every package, per scope (release/component)
CREATE TABLE IF NOT EXISTS baselines (
    scope TEXT NOT NULL,
    pkg_name TEXT NOT NULL,
    version TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    PRIMARY KEY (scope, pkg_name)
);

-- First time each name:version change key was reported, per scope
CREATE TABLE IF NOT EXISTS ledger (
    scope TEXT NOT NULL,
    change_key TEXT NOT NULL,
    detected_at TEXT NOT NULL,

    PRIMARY KEY (scope, change_key)
);

CREATE INDEX IF NOT EXISTS idx_ledger_detected ON ledger(scope, detected_at);
"#;
