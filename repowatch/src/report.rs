//! Rendering of per-scope results for terminals and markdown pages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::DiffOutcome;
use crate::error::Result;
use crate::index::PackageIndex;
use crate::models::{format_size, ChangeKind, DisplayPackage, IndexSummary, Scope};

/// Everything a renderer needs about one scope after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeReport {
    pub scope: Scope,
    pub generated_at: DateTime<Utc>,
    pub summary: IndexSummary,
    pub outcome: DiffOutcome,
}

impl ScopeReport {
    pub fn new(index: &PackageIndex, outcome: DiffOutcome, generated_at: DateTime<Utc>) -> Self {
        Self {
            scope: outcome.scope.clone(),
            generated_at,
            summary: index.summary().clone(),
            outcome,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compact terminal listing of the change feed.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let outcome = &self.outcome;

        out.push_str(&format!(
            "Changes in {} ({} of {} shown):\n",
            self.scope,
            outcome.changes.len(),
            outcome.total_changes
        ));
        out.push('\n');
        out.push_str(&format!(
            "{:<3} {:<35} {:<20} {:<20} {:<17}\n",
            "", "Package", "Previous", "Version", "Detected"
        ));
        out.push_str(&format!("{}\n", "-".repeat(98)));

        for change in &outcome.changes {
            let icon = match change.kind {
                ChangeKind::New => "+",
                ChangeKind::Updated => "↑",
            };
            out.push_str(&format!(
                "{:<3} {:<35} {:<20} {:<20} {:<17}\n",
                icon,
                change.name,
                change.previous_version.as_deref().unwrap_or("-"),
                change.new_version,
                change.detected_at.format("%Y-%m-%d %H:%M")
            ));
        }

        if !outcome.removed.is_empty() {
            out.push('\n');
            out.push_str(&format!("Removed: {}\n", outcome.removed.join(", ")));
        }

        out
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let summary = &self.summary;
        let outcome = &self.outcome;

        md.push_str(&format!("# {}\n\n", self.scope));
        md.push_str(&format!(
            "Generated: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));

        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        md.push_str(&format!("| Packages | {} |\n", summary.total_packages));
        md.push_str(&format!("| Total Size | {} |\n", format_size(summary.total_size)));
        md.push_str(&format!("| New | {} |\n", outcome.count(ChangeKind::New)));
        md.push_str(&format!("| Updated | {} |\n", outcome.count(ChangeKind::Updated)));
        md.push_str(&format!("| Removed | {} |\n\n", outcome.removed.len()));

        if !outcome.changes.is_empty() {
            md.push_str("## Recent Changes\n\n");
            md.push_str("| Package | Previous | Version | Detected |\n");
            md.push_str("|---------|----------|---------|----------|\n");
            for change in &outcome.changes {
                let previous = match change.kind {
                    ChangeKind::New => "*new*",
                    ChangeKind::Updated => change.previous_version.as_deref().unwrap_or("-"),
                };
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    change.name,
                    previous,
                    change.new_version,
                    change.detected_at.format("%Y-%m-%d %H:%M")
                ));
            }
            if outcome.total_changes > outcome.changes.len() {
                md.push_str(&format!(
                    "\n*...and {} more*\n",
                    outcome.total_changes - outcome.changes.len()
                ));
            }
            md.push('\n');
        }

        push_package_table(&mut md, "Latest Packages", &summary.latest_packages);
        push_package_table(&mut md, "Largest Packages", &summary.largest_packages);

        md
    }
}

fn push_package_table(md: &mut String, title: &str, packages: &[DisplayPackage]) {
    if packages.is_empty() {
        return;
    }

    md.push_str(&format!("## {}\n\n", title));
    md.push_str("| Package | Version | Architecture | Size |\n");
    md.push_str("|---------|---------|--------------|------|\n");
    for pkg in packages {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            pkg.name,
            pkg.version,
            pkg.architecture.as_deref().unwrap_or("N/A"),
            format_size(pkg.size)
        ));
    }
    md.push('\n');
}
