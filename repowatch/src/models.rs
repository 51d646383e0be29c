//! Data models shared by the parser, index, stores and engine

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One control stanza: field name to value, in the order the fields appeared.
pub type FieldMap = IndexMap<String, String>;

/// Last-seen package name to version mapping for one scope.
pub type Baseline = BTreeMap<String, String>;

/// First-seen timestamps for one scope, keyed by `name:version`.
pub type LedgerEntries = BTreeMap<String, DateTime<Utc>>;

/// Partition key for all persisted state: a repository release and a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub release: String,
    pub component: String,
}

impl Scope {
    pub fn new(release: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            component: component.into(),
        }
    }

    /// Storage key, `release/component`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.release, self.component)
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((release, component))
                if !release.trim().is_empty()
                    && !component.trim().is_empty()
                    && !component.contains('/') =>
            {
                Ok(Scope::new(release.trim(), component.trim()))
            }
            _ => Err(Error::InvalidScope(s.to_string())),
        }
    }
}

/// A parsed package stanza with its identity fields pulled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub fields: FieldMap,
}

impl PackageRecord {
    /// Build a record from a stanza. Stanzas without a `Package` value have
    /// no identity and yield `None`; a missing `Version` is the empty string.
    pub fn from_fields(fields: FieldMap) -> Option<Self> {
        let name = fields.get("Package").map(|s| s.trim().to_string())?;
        if name.is_empty() {
            return None;
        }
        let version = fields.get("Version").cloned().unwrap_or_default();
        Some(Self {
            name,
            version,
            fields,
        })
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    pub fn architecture(&self) -> Option<&str> {
        self.field("Architecture")
    }

    pub fn description(&self) -> Option<&str> {
        self.field("Description")
    }

    /// `Size` as bytes; absent or non-numeric sizes count as zero.
    pub fn size(&self) -> u64 {
        self.field("Size")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }
}

/// Kind of change reported for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Updated,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::New => "new",
            ChangeKind::Updated => "updated",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the change feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub name: String,
    pub new_version: String,
    pub previous_version: Option<String>,
    pub kind: ChangeKind,
    pub detected_at: DateTime<Utc>,
}

/// Ledger key for a package at a version.
pub fn change_key(name: &str, version: &str) -> String {
    format!("{}:{}", name, version)
}

/// Package name part of a ledger key. Names never contain a colon, versions may.
pub fn change_key_name(key: &str) -> &str {
    key.split_once(':').map(|(name, _)| name).unwrap_or(key)
}

/// Reduced, display-ready view of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPackage {
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    pub size: u64,
    pub description: Option<String>,
}

impl DisplayPackage {
    pub fn from_record(record: &PackageRecord, description_limit: usize) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            architecture: record.architecture().map(|s| s.to_string()),
            size: record.size(),
            description: record
                .description()
                .map(|d| d.chars().take(description_limit).collect()),
        }
    }
}

/// Summary projections of an index, consumed by renderers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    pub total_packages: usize,
    pub total_size: u64,
    pub latest_packages: Vec<DisplayPackage>,
    pub largest_packages: Vec<DisplayPackage>,
}

/// Format bytes into a human-readable string, e.g. `12.3 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;

    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }

    format!("{:.1} TB", size)
}
