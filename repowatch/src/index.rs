//! Package index construction
//!
//! Collapses a batch of parsed records into one winning record per package
//! name and derives the summary projections handed to renderers.

use indexmap::IndexMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::models::{Baseline, DisplayPackage, IndexSummary, PackageRecord};
use crate::version::{Lexicographic, VersionOrder};

/// Deduplicated packages of one scope for one run.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    packages: IndexMap<String, PackageRecord>,
    summary: IndexSummary,
    description_limit: usize,
}

impl PackageIndex {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    /// Winning records in first-seen order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.values()
    }

    /// Sum of the winners' sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.summary.total_size
    }

    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }

    /// Name to version projection; this is what gets saved as the next baseline.
    pub fn versions(&self) -> Baseline {
        self.packages
            .values()
            .map(|record| (record.name.clone(), record.version.clone()))
            .collect()
    }

    /// Reduced, display-ready view of every winner.
    pub fn display_packages(&self) -> Vec<DisplayPackage> {
        self.packages
            .values()
            .map(|record| DisplayPackage::from_record(record, self.description_limit))
            .collect()
    }
}

/// Builds a [`PackageIndex`] using a pluggable version order.
pub struct IndexBuilder {
    order: Box<dyn VersionOrder>,
    config: EngineConfig,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl IndexBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            order: Box::new(Lexicographic),
            config,
        }
    }

    pub fn with_order(mut self, order: Box<dyn VersionOrder>) -> Self {
        self.order = order;
        self
    }

    /// Deduplicate `records` by name. A later record replaces the stored one
    /// only when its version is strictly greater under the configured order.
    pub fn build<I>(&self, records: I) -> PackageIndex
    where
        I: IntoIterator<Item = PackageRecord>,
    {
        let mut packages: IndexMap<String, PackageRecord> = IndexMap::new();
        let mut seen = 0usize;

        for record in records {
            seen += 1;
            match packages.get_mut(&record.name) {
                Some(existing) => {
                    if self.order.compare(&record.version, &existing.version).is_gt() {
                        *existing = record;
                    }
                }
                None => {
                    packages.insert(record.name.clone(), record);
                }
            }
        }

        let summary = self.summarize(&packages);
        debug!(
            records = seen,
            unique = packages.len(),
            total_size = summary.total_size,
            "built package index"
        );

        PackageIndex {
            packages,
            summary,
            description_limit: self.config.description_limit,
        }
    }

    fn summarize(&self, packages: &IndexMap<String, PackageRecord>) -> IndexSummary {
        let limit = self.config.description_limit;
        let winners: Vec<&PackageRecord> = packages.values().collect();

        let total_size = winners
            .iter()
            .fold(0u64, |acc, record| acc.saturating_add(record.size()));

        let mut by_version = winners.clone();
        by_version.sort_by(|a, b| self.order.compare(&b.version, &a.version));

        let mut by_size = winners;
        by_size.sort_by_key(|record| std::cmp::Reverse(record.size()));

        IndexSummary {
            total_packages: packages.len(),
            total_size,
            latest_packages: by_version
                .into_iter()
                .take(self.config.latest_limit)
                .map(|record| DisplayPackage::from_record(record, limit))
                .collect(),
            largest_packages: by_size
                .into_iter()
                .take(self.config.largest_limit)
                .map(|record| DisplayPackage::from_record(record, limit))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::parse_packages;
    use crate::models::FieldMap;
    use crate::version::DebianOrder;

    fn record(name: &str, version: &str, size: &str) -> PackageRecord {
        let mut fields = FieldMap::new();
        fields.insert("Package".to_string(), name.to_string());
        fields.insert("Version".to_string(), version.to_string());
        fields.insert("Size".to_string(), size.to_string());
        PackageRecord::from_fields(fields).unwrap()
    }

    #[test]
    fn test_dedup_keeps_greatest_version() {
        let index = IndexBuilder::default().build(vec![
            record("foo", "1.0", "10"),
            record("bar", "2.0", "20"),
            record("foo", "1.2", "12"),
            record("foo", "1.1", "11"),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("foo").unwrap().version, "1.2");
        assert_eq!(index.get("foo").unwrap().size(), 12);

        let names: Vec<&str> = index.packages().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }

    #[test]
    fn test_dedup_is_lexicographic_by_default() {
        let index = IndexBuilder::default()
            .build(vec![record("foo", "10", "0"), record("foo", "9", "0")]);
        assert_eq!(index.get("foo").unwrap().version, "9");
    }

    #[test]
    fn test_dedup_with_debian_order() {
        let index = IndexBuilder::default()
            .with_order(Box::new(DebianOrder))
            .build(vec![record("foo", "10", "0"), record("foo", "9", "0")]);
        assert_eq!(index.get("foo").unwrap().version, "10");
    }

    #[test]
    fn test_equal_version_keeps_first() {
        let index = IndexBuilder::default()
            .build(vec![record("foo", "1.0", "1"), record("foo", "1.0", "2")]);
        assert_eq!(index.get("foo").unwrap().size(), 1);
    }

    #[test]
    fn test_non_numeric_size_counts_as_zero() {
        let index = IndexBuilder::default().build(vec![
            record("foo", "1.0", "abc"),
            record("bar", "1.0", "300"),
        ]);

        assert_eq!(index.len(), 2);
        assert!(index.get("foo").is_some());
        assert_eq!(index.total_size(), 300);
        assert_eq!(index.summary().largest_packages[0].name, "bar");
        assert_eq!(index.summary().largest_packages[1].size, 0);
    }

    #[test]
    fn test_total_size_uses_winners_only() {
        let index = IndexBuilder::default().build(vec![
            record("foo", "1.0", "100"),
            record("foo", "2.0", "250"),
        ]);
        assert_eq!(index.total_size(), 250);
    }

    #[test]
    fn test_total_size_saturates() {
        let index = IndexBuilder::default().build(vec![
            record("foo", "1.0", "10000000000000000000"),
            record("bar", "1.0", "10000000000000000000"),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.total_size(), u64::MAX);
    }

    #[test]
    fn test_projections_are_capped_and_sorted() {
        let records: Vec<PackageRecord> = (0..25)
            .map(|i| record(&format!("pkg{:02}", i), &format!("1.{:02}", i), &i.to_string()))
            .collect();
        let index = IndexBuilder::default().build(records);
        let summary = index.summary();

        assert_eq!(summary.total_packages, 25);
        assert_eq!(summary.latest_packages.len(), 20);
        assert_eq!(summary.latest_packages[0].version, "1.24");
        assert_eq!(summary.latest_packages[19].version, "1.05");

        assert_eq!(summary.largest_packages.len(), 10);
        assert_eq!(summary.largest_packages[0].size, 24);
        assert_eq!(summary.largest_packages[9].size, 15);
    }

    #[test]
    fn test_versions_projection() {
        let text = "Package: foo\nVersion: 1.0\n\nPackage: bar\nVersion: 2.0\n";
        let index = IndexBuilder::default().build(parse_packages(text));
        let versions = index.versions();

        assert_eq!(versions.len(), 2);
        assert_eq!(versions["foo"], "1.0");
        assert_eq!(versions["bar"], "2.0");
    }

    #[test]
    fn test_display_packages_truncate() {
        let mut fields = FieldMap::new();
        fields.insert("Package".to_string(), "foo".to_string());
        fields.insert("Description".to_string(), "d".repeat(120));
        let config = EngineConfig {
            description_limit: 10,
            ..EngineConfig::default()
        };
        let index = IndexBuilder::new(config).build(PackageRecord::from_fields(fields));

        let display = index.display_packages();
        assert_eq!(display[0].description.as_deref(), Some("dddddddddd"));
    }
}
