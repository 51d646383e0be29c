//! Package state differencing
//!
//! Compares a freshly built [`PackageIndex`] with the stored baseline of its
//! scope and produces the change feed. Saving the new baseline is a separate
//! step ([`DiffEngine::commit_baseline`]) taken after the feed has been
//! consumed, so a crash in between re-reports the same changes on the next
//! run: delivery is at-least-once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::control::parse_packages;
use crate::error::{Error, Result};
use crate::index::{IndexBuilder, PackageIndex};
use crate::ledger::TimestampLedger;
use crate::models::{change_key, ChangeKind, ChangeRecord, Scope};
use crate::store::{LedgerStore, StateStore};

/// Result of diffing one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffOutcome {
    pub scope: Scope,
    /// Change feed, most recently detected first, capped.
    pub changes: Vec<ChangeRecord>,
    /// Number of changes before capping.
    pub total_changes: usize,
    /// Baseline names missing from the current index. Informational only.
    pub removed: Vec<String>,
}

impl DiffOutcome {
    pub fn is_empty(&self) -> bool {
        self.total_changes == 0 && self.removed.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Per-scope results of compacting several ledgers.
#[derive(Debug, Default)]
pub struct CompactionSummary {
    pub compacted: Vec<(Scope, usize)>,
    /// Scopes with no stored baseline, left untouched.
    pub skipped: Vec<Scope>,
    pub failed: Vec<(Scope, Error)>,
}

impl CompactionSummary {
    pub fn removed(&self) -> usize {
        self.compacted.iter().map(|(_, removed)| removed).sum()
    }
}

pub struct DiffEngine<'a, S, L>
where
    S: StateStore + ?Sized,
    L: LedgerStore + ?Sized,
{
    baselines: &'a S,
    ledger: TimestampLedger<'a, L>,
    config: EngineConfig,
}

impl<'a, S, L> DiffEngine<'a, S, L>
where
    S: StateStore + ?Sized,
    L: LedgerStore + ?Sized,
{
    pub fn new(baselines: &'a S, ledger: &'a L, config: EngineConfig) -> Self {
        Self {
            baselines,
            ledger: TimestampLedger::new(ledger),
            config,
        }
    }

    pub fn ledger(&mut self) -> &mut TimestampLedger<'a, L> {
        &mut self.ledger
    }

    /// Diff `current` against the stored baseline of `scope`.
    ///
    /// First-seen timestamps are taken from the ledger, with `now` assigned
    /// to change keys never seen before, and the ledger is flushed before
    /// returning. If that flush fails the error is returned and the
    /// assignments stay in memory, so calling `diff` again reproduces the
    /// same feed and retries the write.
    pub fn diff(
        &mut self,
        scope: &Scope,
        current: &PackageIndex,
        now: DateTime<Utc>,
    ) -> Result<DiffOutcome> {
        let baseline = self.baselines.load_baseline(scope);
        if baseline.is_empty() {
            info!(scope = %scope, "no baseline found, every package is new");
        }

        let mut changes = Vec::new();
        for record in current.packages() {
            let (kind, previous_version) = match baseline.get(&record.name) {
                None => (ChangeKind::New, None),
                Some(previous) if *previous != record.version => {
                    (ChangeKind::Updated, Some(previous.clone()))
                }
                Some(_) => continue,
            };

            let key = change_key(&record.name, &record.version);
            let detected_at = self.ledger.get_or_assign(scope, &key, now);
            changes.push(ChangeRecord {
                name: record.name.clone(),
                new_version: record.version.clone(),
                previous_version,
                kind,
                detected_at,
            });
        }

        self.ledger.flush(scope)?;

        // Stable sort: ties keep insertion order
        changes.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        let total_changes = changes.len();
        changes.truncate(self.config.feed_cap);

        let removed: Vec<String> = baseline
            .keys()
            .filter(|name| current.get(name).is_none())
            .cloned()
            .collect();

        info!(
            scope = %scope,
            packages = current.len(),
            changes = total_changes,
            reported = changes.len(),
            removed = removed.len(),
            "diff complete"
        );

        Ok(DiffOutcome {
            scope: scope.clone(),
            changes,
            total_changes,
            removed,
        })
    }

    /// Parse one or more listings (e.g. one per architecture), merge their
    /// records in order, build the index and diff it.
    pub fn diff_listings<'t, I>(
        &mut self,
        scope: &Scope,
        builder: &IndexBuilder,
        listings: I,
        now: DateTime<Utc>,
    ) -> Result<(PackageIndex, DiffOutcome)>
    where
        I: IntoIterator<Item = &'t str>,
    {
        let records = listings.into_iter().flat_map(parse_packages);
        let index = builder.build(records);
        debug!(scope = %scope, packages = index.len(), "indexed listings");
        let outcome = self.diff(scope, &index, now)?;
        Ok((index, outcome))
    }

    /// Persist `current` as the baseline for the next run of `scope`.
    pub fn commit_baseline(&self, scope: &Scope, current: &PackageIndex) -> Result<()> {
        let versions = current.versions();
        self.baselines
            .save_baseline(scope, &versions)
            .map_err(|e| {
                warn!(scope = %scope, error = %e, "failed to save baseline");
                Error::persist(scope, e)
            })?;
        debug!(scope = %scope, packages = versions.len(), "saved baseline");
        Ok(())
    }

    /// Drop ledger entries of `scope` for packages absent from its stored
    /// baseline, then flush. Returns the number of entries removed.
    pub fn compact_ledger(&mut self, scope: &Scope) -> Result<usize> {
        let baseline = self.baselines.load_baseline(scope);
        let removed = self
            .ledger
            .compact(scope, |name| baseline.contains_key(name));
        self.ledger.flush(scope)?;
        info!(scope = %scope, removed, "compacted ledger");
        Ok(removed)
    }

    /// Compact each scope in turn. A failing scope is logged and recorded;
    /// the remaining scopes are still compacted.
    pub fn compact_scopes(&mut self, scopes: &[Scope]) -> CompactionSummary {
        let mut summary = CompactionSummary::default();
        for scope in scopes {
            if self.baselines.load_baseline(scope).is_empty() {
                warn!(scope = %scope, "no baseline stored, skipping compaction");
                summary.skipped.push(scope.clone());
                continue;
            }
            match self.compact_ledger(scope) {
                Ok(removed) => summary.compacted.push((scope.clone(), removed)),
                Err(e) => {
                    error!(scope = %scope, error = %e, "compaction failed");
                    summary.failed.push((scope.clone(), e));
                }
            }
        }
        summary
    }
}
