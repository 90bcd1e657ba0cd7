// SPDX-License-Identifier: MIT

//! Report aggregation and rendering (markdown summary + CSV export)

use std::collections::BTreeMap;
use std::path::Path;

use crate::audit::{AuditOutcome, Category, Severity, Verdict};
use crate::db::CollectionType;
use crate::Result;

/// Flagged HIGH items shown in full in the markdown report
const HIGH_DETAIL_LIMIT: usize = 20;
/// Flagged MEDIUM items previewed in the markdown report
const MEDIUM_PREVIEW_LIMIT: usize = 10;
/// Text preview length for report entries
const TEXT_PREVIEW_CHARS: usize = 200;

/// Aggregated output of one audit run
#[derive(Debug)]
pub struct AuditReport {
    /// Verdicts with severity != none, HIGH first, then MEDIUM, then LOW;
    /// original item order within each severity
    pub items: Vec<Verdict>,
    pub total_flagged: usize,
    pub clean_items: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_collection: BTreeMap<CollectionType, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub failed_batches: usize,
    pub unaudited_items: usize,
}

impl AuditReport {
    /// Build a report from an audit outcome.
    ///
    /// The count maps are derived from `items` alone, so
    /// `sum(by_severity) == sum(by_collection) == items.len()`.
    pub fn aggregate(outcome: &AuditOutcome) -> Self {
        let clean_items = outcome.verdicts.iter().filter(|v| !v.is_flagged()).count();

        let mut items: Vec<Verdict> = outcome
            .verdicts
            .iter()
            .filter(|v| v.is_flagged())
            .cloned()
            .collect();
        // Severity variants order most-severe-first; stable sort keeps
        // original item order within a severity
        items.sort_by_key(|v| v.severity);

        let mut by_severity = BTreeMap::new();
        let mut by_collection = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        for v in &items {
            *by_severity.entry(v.severity).or_insert(0) += 1;
            *by_collection.entry(v.collection).or_insert(0) += 1;
            // A verdict counts once per category it carries
            for &c in &v.categories {
                *by_category.entry(c).or_insert(0) += 1;
            }
        }

        Self {
            total_flagged: items.len(),
            clean_items,
            items,
            by_severity,
            by_collection,
            by_category,
            failed_batches: outcome.failed_batches.len(),
            unaudited_items: outcome.unaudited_items(),
        }
    }

    /// Render the markdown summary document
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();

        out.push_str("# Profile Audit Report\n\n## Summary\n\n");
        out.push_str(&format!(
            "**Total items flagged:** {} ({} clean)\n\n",
            self.total_flagged, self.clean_items
        ));

        if self.failed_batches > 0 {
            out.push_str(&format!(
                "> **Warning:** {} batches failed to classify; {} items were not audited. \
Re-run the audit to cover them.\n\n",
                self.failed_batches, self.unaudited_items
            ));
        }

        out.push_str("### By severity\n\n");
        out.push_str(&format!(
            "- **HIGH**: {} items (should definitely review/remove)\n",
            self.severity_count(Severity::High)
        ));
        out.push_str(&format!(
            "- **MEDIUM**: {} items (probably should review)\n",
            self.severity_count(Severity::Medium)
        ));
        out.push_str(&format!(
            "- **LOW**: {} items (minor concerns)\n\n",
            self.severity_count(Severity::Low)
        ));

        out.push_str("### By type\n\n");
        for collection in CollectionType::ALL {
            out.push_str(&format!(
                "- {}s: {}\n",
                collection.label(),
                self.by_collection.get(&collection).copied().unwrap_or(0)
            ));
        }
        out.push('\n');

        if !self.by_category.is_empty() {
            out.push_str("### By category\n\n");
            // Most frequent first
            let mut counts: Vec<(&Category, &usize)> = self.by_category.iter().collect();
            counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (category, count) in counts {
                out.push_str(&format!("- {}: {}\n", category, count));
            }
            out.push('\n');
        }

        let high: Vec<&Verdict> = self.items_with(Severity::High);
        if !high.is_empty() {
            out.push_str(&format!("## HIGH priority ({} items)\n\n", high.len()));
            for v in high.iter().take(HIGH_DETAIL_LIMIT) {
                out.push_str(&render_item(v, TEXT_PREVIEW_CHARS));
            }
            if high.len() > HIGH_DETAIL_LIMIT {
                out.push_str(&format!(
                    "*... and {} more high priority items*\n\n",
                    high.len() - HIGH_DETAIL_LIMIT
                ));
            }
        }

        let medium: Vec<&Verdict> = self.items_with(Severity::Medium);
        if !medium.is_empty() {
            out.push_str(&format!("## MEDIUM priority ({} items)\n\n", medium.len()));
            for v in medium.iter().take(MEDIUM_PREVIEW_LIMIT) {
                out.push_str(&render_item(v, TEXT_PREVIEW_CHARS));
            }
            if medium.len() > MEDIUM_PREVIEW_LIMIT {
                out.push_str(&format!(
                    "*... and {} more medium priority items*\n\n",
                    medium.len() - MEDIUM_PREVIEW_LIMIT
                ));
            }
        }

        let low_count = self.severity_count(Severity::Low);
        if low_count > 0 {
            out.push_str(&format!(
                "## LOW priority\n\n{} items with minor concerns. See the CSV export for the full list.\n\n",
                low_count
            ));
        }

        out.push_str(
            "## Recommendations\n\n\
1. **Review all HIGH priority items** - these should likely be deleted\n\
2. **Assess MEDIUM priority items** - use your judgment\n\
3. **Export the full list** - use `vetter audit --export` for systematic review\n",
        );

        out
    }

    /// Write the markdown report to a file
    pub fn write_markdown<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.render_markdown())?;
        Ok(())
    }

    /// Write the flat tabular export: one row per flagged item, text
    /// truncated to `text_cap` characters.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, text_cap: usize) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "Type",
            "ID",
            "Severity",
            "Categories",
            "Reason",
            "Text",
            "Created At",
        ])?;

        for v in &self.items {
            let categories = v
                .categories
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let text: String = v.text_snapshot.chars().take(text_cap).collect();
            let created = v
                .created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            writer.write_record([
                v.collection.label(),
                &v.item_id,
                v.severity.as_str(),
                &categories,
                &v.reason,
                &text,
                &created,
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    fn severity_count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    fn items_with(&self, severity: Severity) -> Vec<&Verdict> {
        self.items.iter().filter(|v| v.severity == severity).collect()
    }
}

fn render_item(v: &Verdict, preview_chars: usize) -> String {
    let categories = v
        .categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let preview: String = v.text_snapshot.chars().take(preview_chars).collect();
    let ellipsis = if v.text_snapshot.chars().count() > preview_chars {
        "..."
    } else {
        ""
    };
    format!(
        "### {} ID: {}\n**Categories:** {}\n**Reason:** {}\n**Text:** {}{}\n\n",
        v.collection.label(),
        v.item_id,
        categories,
        v.reason,
        preview,
        ellipsis
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditOutcome;

    fn verdict(id: &str, severity: Severity, categories: Vec<Category>) -> Verdict {
        Verdict {
            item_id: id.to_string(),
            collection: CollectionType::Post,
            severity,
            categories,
            reason: "test".to_string(),
            text_snapshot: format!("text of {}", id),
            created_at: None,
        }
    }

    fn outcome(verdicts: Vec<Verdict>) -> AuditOutcome {
        let total_items = verdicts.len();
        AuditOutcome {
            verdicts,
            failed_batches: Vec::new(),
            total_items,
        }
    }

    #[test]
    fn test_nothing_flagged() {
        let verdicts = (0..45)
            .map(|i| verdict(&format!("{}", i), Severity::None, vec![]))
            .collect();
        let report = AuditReport::aggregate(&outcome(verdicts));

        assert_eq!(report.total_flagged, 0);
        assert!(report.items.is_empty());
        assert_eq!(report.clean_items, 45);
    }

    #[test]
    fn test_none_excluded_and_ordered() {
        // HIGH/POLITICAL, MEDIUM/PROFANITY, NONE -> two flagged, HIGH first
        let report = AuditReport::aggregate(&outcome(vec![
            verdict("2", Severity::Medium, vec![Category::Profanity]),
            verdict("1", Severity::High, vec![Category::Political]),
            verdict("3", Severity::None, vec![]),
        ]));

        assert_eq!(report.by_severity.get(&Severity::High), Some(&1));
        assert_eq!(report.by_severity.get(&Severity::Medium), Some(&1));
        assert_eq!(report.by_severity.get(&Severity::None), None);
        let ids: Vec<&str> = report.items.iter().map(|v| v.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(report.clean_items, 1);
    }

    #[test]
    fn test_sort_is_stable_within_severity() {
        let report = AuditReport::aggregate(&outcome(vec![
            verdict("a", Severity::Low, vec![Category::Personal]),
            verdict("b", Severity::High, vec![Category::Nsfw]),
            verdict("c", Severity::Low, vec![Category::Personal]),
            verdict("d", Severity::High, vec![Category::Nsfw]),
        ]));

        let ids: Vec<&str> = report.items.iter().map(|v| v.item_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_aggregation_consistency() {
        let report = AuditReport::aggregate(&outcome(vec![
            verdict("1", Severity::High, vec![Category::Political, Category::Offensive]),
            verdict("2", Severity::Medium, vec![Category::Profanity]),
            verdict("3", Severity::Low, vec![Category::Personal]),
            verdict("4", Severity::None, vec![]),
        ]));

        assert_eq!(report.by_severity.values().sum::<usize>(), report.items.len());
        assert_eq!(
            report.by_collection.values().sum::<usize>(),
            report.items.len()
        );
        // One increment per carried category: 2 + 1 + 1
        assert_eq!(report.by_category.values().sum::<usize>(), 4);
    }

    #[test]
    fn test_csv_truncates_text() {
        let mut v = verdict("1", Severity::High, vec![Category::Nsfw]);
        v.text_snapshot = "x".repeat(600);
        let report = AuditReport::aggregate(&outcome(vec![v]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        report.write_csv(&path, 500).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.get(5).unwrap(), "x".repeat(500));
    }

    #[test]
    fn test_csv_columns() {
        let report = AuditReport::aggregate(&outcome(vec![verdict(
            "42",
            Severity::Medium,
            vec![Category::Political, Category::Controversial],
        )]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        report.write_csv(&path, 500).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["Type", "ID", "Severity", "Categories", "Reason", "Text", "Created At"]
        );
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.get(0).unwrap(), "Post");
        assert_eq!(record.get(1).unwrap(), "42");
        assert_eq!(record.get(3).unwrap(), "political,controversial");
    }

    #[test]
    fn test_markdown_warning_for_failed_batches() {
        use crate::audit::FailedBatch;
        use crate::error::ClassificationErrorKind;

        let outcome = AuditOutcome {
            verdicts: vec![verdict("1", Severity::None, vec![])],
            failed_batches: vec![FailedBatch {
                collection: CollectionType::Like,
                first_id: "5".to_string(),
                last_id: "9".to_string(),
                size: 5,
                kind: ClassificationErrorKind::RateLimited,
            }],
            total_items: 6,
        };
        let report = AuditReport::aggregate(&outcome);
        let markdown = report.render_markdown();

        assert!(markdown.contains("1 batches failed to classify"));
        assert!(markdown.contains("5 items were not audited"));
        assert!(markdown.contains("Re-run the audit"));
    }

    #[test]
    fn test_markdown_sections() {
        let verdicts = vec![
            verdict("h1", Severity::High, vec![Category::Political]),
            verdict("m1", Severity::Medium, vec![Category::Profanity]),
            verdict("l1", Severity::Low, vec![Category::Personal]),
        ];
        let report = AuditReport::aggregate(&outcome(verdicts));
        let markdown = report.render_markdown();

        assert!(markdown.contains("# Profile Audit Report"));
        assert!(markdown.contains("## HIGH priority (1 items)"));
        assert!(markdown.contains("### Post ID: h1"));
        assert!(markdown.contains("## MEDIUM priority (1 items)"));
        // LOW items get counts only, no per-item detail
        assert!(!markdown.contains("### Post ID: l1"));
        assert!(markdown.contains("## LOW priority"));
    }
}
