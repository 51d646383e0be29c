//! JSON state file backend
//!
//! Keeps every scope's baseline and ledger in one document. Each scope is
//! decoded on its own, so damage is confined to the scope it occurs in:
//!
//! ```json
//! {
//!   "baselines": { "jammy/main": { "foo": "1.0" } },
//!   "ledger": { "jammy/main": { "foo:1.0": "2025-06-01T08:00:00+00:00" } }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Baseline, LedgerEntries, Scope};
use crate::store::{LedgerStore, StateStore};

const BASELINES: &str = "baselines";
const LEDGER: &str = "ledger";

/// Raw state document. Scopes are decoded one at a time so a malformed
/// scope never hides or clobbers the others.
#[derive(Debug, Default)]
struct StateDocument {
    root: Map<String, Value>,
}

impl StateDocument {
    fn scope_entries(&self, section: &str, scope: &Scope) -> Option<&Map<String, Value>> {
        let value = self.root.get(section)?.get(scope.key().as_str())?;
        match value.as_object() {
            Some(entries) => Some(entries),
            None => {
                warn!(section, scope = %scope, "ignoring malformed scope in state file");
                None
            }
        }
    }

    fn set_scope(&mut self, section: &str, scope: &Scope, entries: Map<String, Value>) {
        let slot = self
            .root
            .entry(section)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(scopes) = slot {
            scopes.insert(scope.key(), Value::Object(entries));
        }
    }
}

/// Baselines and ledger stored in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the document. A missing file or one that is not a JSON object
    /// reads as empty; any other read failure is an error.
    fn read(&self) -> Result<StateDocument> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "state file not found, starting empty");
                return Ok(StateDocument::default());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(path = %self.path.display(), error = %e, "state file is not UTF-8, treating as empty");
                return Ok(StateDocument::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(root)) => Ok(StateDocument { root }),
            Ok(_) => {
                warn!(path = %self.path.display(), "state file is not a JSON object, treating as empty");
                Ok(StateDocument::default())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt state file, treating as empty");
                Ok(StateDocument::default())
            }
        }
    }

    /// Document for loads, which never fail.
    fn read_lenient(&self) -> StateDocument {
        self.read().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "cannot read state file, treating as empty");
            StateDocument::default()
        })
    }

    /// Write the document through a sibling temp file and rename it into place.
    fn write(&self, doc: &StateDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_string_pretty(&doc.root)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for JsonStateFile {
    fn load_baseline(&self, scope: &Scope) -> Baseline {
        let doc = self.read_lenient();
        let Some(entries) = doc.scope_entries(BASELINES, scope) else {
            return Baseline::new();
        };

        entries
            .iter()
            .filter_map(|(name, version)| match version.as_str() {
                Some(version) => Some((name.clone(), version.to_string())),
                None => {
                    warn!(scope = %scope, package = %name, "dropping malformed baseline entry");
                    None
                }
            })
            .collect()
    }

    fn save_baseline(&self, scope: &Scope, baseline: &Baseline) -> Result<()> {
        let mut doc = self.read()?;
        let entries = baseline
            .iter()
            .map(|(name, version)| (name.clone(), Value::String(version.clone())))
            .collect();
        doc.set_scope(BASELINES, scope, entries);
        self.write(&doc)
    }

    fn scopes(&self) -> Vec<Scope> {
        let doc = self.read_lenient();
        let mut scopes: Vec<Scope> = doc
            .root
            .get(BASELINES)
            .and_then(Value::as_object)
            .map(|section| section.keys().filter_map(|key| key.parse().ok()).collect())
            .unwrap_or_default();
        scopes.sort();
        scopes
    }
}

impl LedgerStore for JsonStateFile {
    fn load_ledger(&self, scope: &Scope) -> LedgerEntries {
        let doc = self.read_lenient();
        let Some(entries) = doc.scope_entries(LEDGER, scope) else {
            return LedgerEntries::new();
        };

        entries
            .iter()
            .filter_map(|(key, stamp)| {
                match stamp.as_str().map(DateTime::parse_from_rfc3339) {
                    Some(Ok(dt)) => Some((key.clone(), dt.with_timezone(&Utc))),
                    _ => {
                        warn!(scope = %scope, key = %key, "dropping unparsable ledger timestamp");
                        None
                    }
                }
            })
            .collect()
    }

    fn save_ledger(&self, scope: &Scope, entries: &LedgerEntries) -> Result<()> {
        let mut doc = self.read()?;
        let entries = entries
            .iter()
            .map(|(key, dt)| (key.clone(), Value::String(dt.to_rfc3339())))
            .collect();
        doc.set_scope(LEDGER, scope, entries);
        self.write(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateFile::new(dir.path().join("state.json"));
        let scope = Scope::new("focal", "main");

        assert!(store.load_baseline(&scope).is_empty());
        assert!(store.load_ledger(&scope).is_empty());
        assert!(store.scopes().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ this is not json").unwrap();
        let store = JsonStateFile::new(&path);
        let scope = Scope::new("focal", "main");

        assert!(store.load_baseline(&scope).is_empty());
        assert!(store.load_ledger(&scope).is_empty());

        // Saving over a corrupt file starts a fresh document
        let mut baseline = Baseline::new();
        baseline.insert("foo".to_string(), "1.0".to_string());
        store.save_baseline(&scope, &baseline).unwrap();
        assert_eq!(store.load_baseline(&scope), baseline);
    }

    #[test]
    fn test_round_trip_keeps_other_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateFile::new(dir.path().join("nested").join("state.json"));
        let main = Scope::new("noble", "main");
        let import = Scope::new("noble", "import");

        let mut a = Baseline::new();
        a.insert("foo".to_string(), "1.0".to_string());
        let mut b = Baseline::new();
        b.insert("bar".to_string(), "2.0".to_string());
        store.save_baseline(&main, &a).unwrap();
        store.save_baseline(&import, &b).unwrap();

        let stamp = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let mut ledger = LedgerEntries::new();
        ledger.insert("foo:1.0".to_string(), stamp);
        store.save_ledger(&main, &ledger).unwrap();

        assert_eq!(store.load_baseline(&main), a);
        assert_eq!(store.load_baseline(&import), b);
        assert_eq!(store.load_ledger(&main), ledger);
        assert!(store.load_ledger(&import).is_empty());
        assert_eq!(store.scopes(), vec![import, main]);
    }

    #[test]
    fn test_bad_timestamp_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"ledger": {"focal/main": {"foo:1.0": "yesterday", "bar:2.0": "2025-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();
        let store = JsonStateFile::new(&path);

        let entries = store.load_ledger(&Scope::new("focal", "main"));
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("bar:2.0"));
    }

    #[test]
    fn test_malformed_scope_leaves_others_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{
                "baselines": {"noble/main": {"foo": "1.0"}, "noble/import": {"bar": "2.0"}, "noble/broken": 7},
                "ledger": {"noble/import": {"bar:2.0": 5}}
            }"#,
        )
        .unwrap();
        let store = JsonStateFile::new(&path);
        let main = Scope::new("noble", "main");
        let import = Scope::new("noble", "import");

        assert_eq!(store.load_baseline(&main)["foo"], "1.0");
        assert!(store.load_ledger(&import).is_empty());
        assert!(store.load_baseline(&Scope::new("noble", "broken")).is_empty());

        let stamp = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let mut ledger = LedgerEntries::new();
        ledger.insert("bar:2.0".to_string(), stamp);
        store.save_ledger(&import, &ledger).unwrap();

        assert_eq!(store.load_baseline(&main)["foo"], "1.0");
        assert_eq!(store.load_baseline(&import)["bar"], "2.0");
        assert_eq!(store.load_ledger(&import), ledger);
    }

    #[test]
    fn test_unreadable_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the state path cannot be read as a file
        let path = dir.path().join("state.json");
        fs::create_dir(&path).unwrap();
        let store = JsonStateFile::new(&path);
        let scope = Scope::new("noble", "main");

        assert!(store.load_baseline(&scope).is_empty());
        assert!(store.save_baseline(&scope, &Baseline::new()).is_err());
        assert!(store.save_ledger(&scope, &LedgerEntries::new()).is_err());
        assert!(path.is_dir());
    }
}
