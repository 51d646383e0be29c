//! Persistence interfaces for baselines and the first-seen ledger
//!
//! Loads never fail: a backend that cannot read its state reports an empty
//! baseline or ledger so the run degrades to "everything is new" instead of
//! aborting. Saves replace the stored state for one scope and must surface
//! failures.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{Baseline, LedgerEntries, Scope};

/// Last-seen name to version mapping, per scope.
pub trait StateStore {
    /// Stored baseline for `scope`, empty when absent or unreadable.
    fn load_baseline(&self, scope: &Scope) -> Baseline;

    /// Replace the stored baseline for `scope`.
    fn save_baseline(&self, scope: &Scope, baseline: &Baseline) -> Result<()>;

    /// Scopes that currently have a stored baseline.
    fn scopes(&self) -> Vec<Scope>;
}

/// First-seen timestamps, per scope.
pub trait LedgerStore {
    /// Stored ledger entries for `scope`, empty when absent or unreadable.
    fn load_ledger(&self, scope: &Scope) -> LedgerEntries;

    /// Replace the stored ledger entries for `scope`.
    fn save_ledger(&self, scope: &Scope, entries: &LedgerEntries) -> Result<()>;
}

/// In-memory backend, for tests and for embedding without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    baselines: RefCell<BTreeMap<Scope, Baseline>>,
    ledgers: RefCell<BTreeMap<Scope, LedgerEntries>>,
    ledger_saves: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger writes performed so far.
    pub fn ledger_saves(&self) -> usize {
        self.ledger_saves.get()
    }
}

impl StateStore for MemoryStore {
    fn load_baseline(&self, scope: &Scope) -> Baseline {
        self.baselines
            .borrow()
            .get(scope)
            .cloned()
            .unwrap_or_default()
    }

    fn save_baseline(&self, scope: &Scope, baseline: &Baseline) -> Result<()> {
        self.baselines
            .borrow_mut()
            .insert(scope.clone(), baseline.clone());
        Ok(())
    }

    fn scopes(&self) -> Vec<Scope> {
        self.baselines.borrow().keys().cloned().collect()
    }
}

impl LedgerStore for MemoryStore {
    fn load_ledger(&self, scope: &Scope) -> LedgerEntries {
        self.ledgers.borrow().get(scope).cloned().unwrap_or_default()
    }

    fn save_ledger(&self, scope: &Scope, entries: &LedgerEntries) -> Result<()> {
        self.ledgers
            .borrow_mut()
            .insert(scope.clone(), entries.clone());
        self.ledger_saves.set(self.ledger_saves.get() + 1);
        Ok(())
    }
}
