//! First-seen ledger
//!
//! Remembers when each `name:version` change key was first reported so that
//! re-running a diff attributes the same change to the same moment. Entries
//! are write-once; the only way they disappear is an explicit [`compact`].
//!
//! [`compact`]: TimestampLedger::compact

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{change_key_name, LedgerEntries, Scope};
use crate::store::LedgerStore;

#[derive(Debug, Default)]
struct LoadedLedger {
    entries: LedgerEntries,
    dirty: bool,
}

/// Per-scope ledger cache over a [`LedgerStore`]. Each scope is loaded on
/// first use and written back by [`flush`](Self::flush) only when modified.
pub struct TimestampLedger<'a, L: LedgerStore + ?Sized> {
    store: &'a L,
    scopes: HashMap<Scope, LoadedLedger>,
}

impl<'a, L: LedgerStore + ?Sized> TimestampLedger<'a, L> {
    pub fn new(store: &'a L) -> Self {
        Self {
            store,
            scopes: HashMap::new(),
        }
    }

    fn loaded(&mut self, scope: &Scope) -> &mut LoadedLedger {
        let store = self.store;
        self.scopes.entry(scope.clone()).or_insert_with(|| {
            let entries = store.load_ledger(scope);
            debug!(scope = %scope, entries = entries.len(), "loaded ledger");
            LoadedLedger {
                entries,
                dirty: false,
            }
        })
    }

    /// Timestamp recorded for `change_key`, if any.
    pub fn get(&mut self, scope: &Scope, change_key: &str) -> Option<DateTime<Utc>> {
        self.loaded(scope).entries.get(change_key).copied()
    }

    /// Return the stored first-seen time for `change_key`, recording `now`
    /// if the key has never been seen in this scope.
    pub fn get_or_assign(
        &mut self,
        scope: &Scope,
        change_key: &str,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let ledger = self.loaded(scope);
        if let Some(existing) = ledger.entries.get(change_key) {
            return *existing;
        }
        ledger.entries.insert(change_key.to_string(), now);
        ledger.dirty = true;
        now
    }

    /// Whether `scope` has assignments not yet written to the store.
    pub fn is_dirty(&self, scope: &Scope) -> bool {
        self.scopes.get(scope).is_some_and(|l| l.dirty)
    }

    /// Write `scope` back to the store. A clean or never-loaded scope is not
    /// written. On failure the pending entries stay in memory so a later
    /// flush can retry them.
    pub fn flush(&mut self, scope: &Scope) -> Result<()> {
        let store = self.store;
        let Some(ledger) = self.scopes.get_mut(scope) else {
            return Ok(());
        };
        if !ledger.dirty {
            return Ok(());
        }

        match store.save_ledger(scope, &ledger.entries) {
            Ok(()) => {
                ledger.dirty = false;
                debug!(scope = %scope, entries = ledger.entries.len(), "flushed ledger");
                Ok(())
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "failed to flush ledger");
                Err(Error::persist(scope, e))
            }
        }
    }

    /// Drop entries whose package name is not live. Returns the number of
    /// entries removed; the caller flushes.
    pub fn compact<F>(&mut self, scope: &Scope, is_live: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let ledger = self.loaded(scope);
        let before = ledger.entries.len();
        ledger.entries.retain(|key, _| is_live(change_key_name(key)));
        let removed = before - ledger.entries.len();
        if removed > 0 {
            ledger.dirty = true;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_assignment_wins() {
        let store = MemoryStore::new();
        let scope = Scope::new("jammy", "main");
        let mut ledger = TimestampLedger::new(&store);

        let first = ledger.get_or_assign(&scope, "foo:1.0", t0());
        let second = ledger.get_or_assign(&scope, "foo:1.0", t0() + Duration::hours(5));

        assert_eq!(first, t0());
        assert_eq!(second, t0());
        assert_eq!(ledger.get(&scope, "foo:1.0"), Some(t0()));
    }

    #[test]
    fn test_flush_only_when_dirty() {
        let store = MemoryStore::new();
        let scope = Scope::new("jammy", "main");
        let mut ledger = TimestampLedger::new(&store);

        ledger.flush(&scope).unwrap();
        assert_eq!(store.ledger_saves(), 0);

        ledger.get_or_assign(&scope, "foo:1.0", t0());
        assert!(ledger.is_dirty(&scope));
        ledger.flush(&scope).unwrap();
        assert_eq!(store.ledger_saves(), 1);
        assert!(!ledger.is_dirty(&scope));

        ledger.get_or_assign(&scope, "foo:1.0", t0() + Duration::days(1));
        ledger.flush(&scope).unwrap();
        assert_eq!(store.ledger_saves(), 1);
    }

    #[test]
    fn test_persisted_across_instances() {
        let store = MemoryStore::new();
        let scope = Scope::new("jammy", "main");

        let mut ledger = TimestampLedger::new(&store);
        ledger.get_or_assign(&scope, "foo:1.0", t0());
        ledger.flush(&scope).unwrap();

        let mut reopened = TimestampLedger::new(&store);
        let later = t0() + Duration::days(3);
        assert_eq!(reopened.get_or_assign(&scope, "foo:1.0", later), t0());
        assert_eq!(reopened.get_or_assign(&scope, "foo:1.1", later), later);
    }

    #[test]
    fn test_scopes_do_not_share_entries() {
        let store = MemoryStore::new();
        let main = Scope::new("jammy", "main");
        let testing = Scope::new("jammy", "testing");
        let mut ledger = TimestampLedger::new(&store);

        ledger.get_or_assign(&main, "foo:1.0", t0());
        let other = ledger.get_or_assign(&testing, "foo:1.0", t0() + Duration::hours(1));
        assert_eq!(other, t0() + Duration::hours(1));
    }

    #[test]
    fn test_compact_drops_dead_names() {
        let store = MemoryStore::new();
        let scope = Scope::new("jammy", "main");
        let mut ledger = TimestampLedger::new(&store);

        ledger.get_or_assign(&scope, "foo:1.0", t0());
        ledger.get_or_assign(&scope, "foo:1.1", t0());
        ledger.get_or_assign(&scope, "gone:2.0", t0());
        ledger.get_or_assign(&scope, "epoch:1:3.0", t0());
        ledger.flush(&scope).unwrap();

        let removed = ledger.compact(&scope, |name| name == "foo" || name == "epoch");
        assert_eq!(removed, 1);
        assert!(ledger.is_dirty(&scope));
        ledger.flush(&scope).unwrap();

        let keys: Vec<String> = store.load_ledger(&scope).into_keys().collect();
        assert_eq!(keys, vec!["epoch:1:3.0", "foo:1.0", "foo:1.1"]);
    }
}
