// SPDX-License-Identifier: MIT

//! Audit orchestration: batching stored content through the classifier
//! and collecting verdicts, tolerating individual batch failures.

pub mod classifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::db::{CollectionType, ContentItem, ContentStore};
use crate::error::ClassificationErrorKind;
use crate::{Result, VetterError};

/// Hard cap on items per classification request, to stay within the
/// service's prompt-size and request-rate constraints.
pub const MAX_BATCH_SIZE: usize = 20;

/// Ranked risk level of a verdict. Variant order is most-severe-first so
/// the derived `Ord` matches report sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    /// Not flagged
    None,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = VetterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "none" | "clean" => Ok(Self::None),
            other => Err(VetterError::classification(
                ClassificationErrorKind::Malformed,
                format!("Unrecognized severity: {}", other),
            )),
        }
    }
}

/// Why content was flagged. Fixed vocabulary; anything else in a
/// response fails the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Political,
    Controversial,
    Nsfw,
    Profanity,
    Personal,
    Unprofessional,
    Offensive,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Political => "political",
            Self::Controversial => "controversial",
            Self::Nsfw => "nsfw",
            Self::Profanity => "profanity",
            Self::Personal => "personal",
            Self::Unprofessional => "unprofessional",
            Self::Offensive => "offensive",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = VetterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "political" => Ok(Self::Political),
            "controversial" => Ok(Self::Controversial),
            "nsfw" => Ok(Self::Nsfw),
            "profanity" => Ok(Self::Profanity),
            "personal" => Ok(Self::Personal),
            "unprofessional" => Ok(Self::Unprofessional),
            "offensive" => Ok(Self::Offensive),
            other => Err(VetterError::classification(
                ClassificationErrorKind::Malformed,
                format!("Unrecognized category: {}", other),
            )),
        }
    }
}

/// The classification result for one content item.
///
/// Carries a snapshot of the item text so reports stay accurate even if
/// the store is refetched later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub item_id: String,
    pub collection: CollectionType,
    pub severity: Severity,
    pub categories: Vec<Category>,
    pub reason: String,
    pub text_snapshot: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Verdict {
    pub fn is_flagged(&self) -> bool {
        self.severity != Severity::None
    }
}

/// A batch the classifier could not process
#[derive(Debug, Clone)]
pub struct FailedBatch {
    pub collection: CollectionType,
    pub first_id: String,
    pub last_id: String,
    pub size: usize,
    pub kind: ClassificationErrorKind,
}

/// Everything one audit run produced
#[derive(Debug, Default)]
pub struct AuditOutcome {
    /// Verdicts in original item order, minus items from failed batches
    pub verdicts: Vec<Verdict>,
    pub failed_batches: Vec<FailedBatch>,
    /// Items loaded from the store across all selected collections
    pub total_items: usize,
}

impl AuditOutcome {
    /// Items that produced no verdict because their batch failed
    pub fn unaudited_items(&self) -> usize {
        self.failed_batches.iter().map(|b| b.size).sum()
    }
}

/// Seam between the orchestrator and the remote classification service.
/// The contract is length- and order-preserving: one verdict per input
/// item, or an error for the whole batch.
#[async_trait]
pub trait BatchClassifier: Send + Sync {
    async fn classify_batch(&self, items: &[ContentItem]) -> Result<Vec<Verdict>>;
}

/// Drives end-to-end classification of the selected collections
pub struct Auditor<'a> {
    store: &'a ContentStore,
    classifier: &'a dyn BatchClassifier,
    batch_size: usize,
}

impl<'a> Auditor<'a> {
    pub fn new(
        store: &'a ContentStore,
        classifier: &'a dyn BatchClassifier,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            classifier,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Run the audit over the given collections.
    ///
    /// Batches are classified strictly one at a time; a failed batch is
    /// recorded and skipped, never aborting the run. Only store errors
    /// and an empty selection abort.
    pub async fn run(&self, selection: &[CollectionType]) -> Result<AuditOutcome> {
        if selection.is_empty() {
            return Err(VetterError::Config(
                "No collection types selected for audit".to_string(),
            ));
        }

        let mut outcome = AuditOutcome::default();

        for &collection in selection {
            let items = self.store.items_by_type(collection, None)?;
            if items.is_empty() {
                debug!("No {} items in store, skipping", collection);
                continue;
            }

            info!(
                "Auditing {} {} items in batches of {}",
                items.len(),
                collection,
                self.batch_size
            );
            outcome.total_items += items.len();

            for batch in items.chunks(self.batch_size) {
                match self.classifier.classify_batch(batch).await {
                    Ok(verdicts) => {
                        debug!(
                            "Batch {}..{} classified ({} verdicts)",
                            batch[0].id,
                            batch[batch.len() - 1].id,
                            verdicts.len()
                        );
                        outcome.verdicts.extend(verdicts);
                    }
                    Err(VetterError::Classification { kind, message }) => {
                        warn!(
                            "Batch {}..{} failed to classify ({}): {}",
                            batch[0].id,
                            batch[batch.len() - 1].id,
                            kind,
                            message
                        );
                        outcome.failed_batches.push(FailedBatch {
                            collection,
                            first_id: batch[0].id.clone(),
                            last_id: batch[batch.len() - 1].id.clone(),
                            size: batch.len(),
                            kind,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if !outcome.failed_batches.is_empty() {
            warn!(
                "{} batches failed to classify; {} items not audited",
                outcome.failed_batches.len(),
                outcome.unaudited_items()
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn item(id: &str, collection: CollectionType, text: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            collection,
            text: text.to_string(),
            created_at: None,
            author_handle: None,
        }
    }

    fn clean_verdict(item: &ContentItem) -> Verdict {
        Verdict {
            item_id: item.id.clone(),
            collection: item.collection,
            severity: Severity::None,
            categories: Vec::new(),
            reason: String::new(),
            text_snapshot: item.text.clone(),
            created_at: item.created_at,
        }
    }

    /// Scripted classifier: records batch sizes and fails the batches
    /// whose (zero-based) index appears in `fail_batches`.
    struct FakeClassifier {
        calls: Mutex<Vec<usize>>,
        fail_batches: Vec<usize>,
        fail_kind: ClassificationErrorKind,
    }

    impl FakeClassifier {
        fn new(fail_batches: Vec<usize>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_batches,
                fail_kind: ClassificationErrorKind::RateLimited,
            }
        }
    }

    #[async_trait]
    impl BatchClassifier for FakeClassifier {
        async fn classify_batch(&self, items: &[ContentItem]) -> Result<Vec<Verdict>> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(items.len());
                calls.len() - 1
            };
            if self.fail_batches.contains(&index) {
                return Err(VetterError::classification(self.fail_kind, "scripted failure"));
            }
            Ok(items.iter().map(clean_verdict).collect())
        }
    }

    fn store_with_likes(n: usize) -> ContentStore {
        let store = ContentStore::in_memory().unwrap();
        for i in 0..n {
            store
                .upsert_item(&item(&format!("{}", i), CollectionType::Like, "text"))
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_batch_sizes_bounded() {
        // 25 items with batch size 20 means exactly two calls: 20 + 5
        let store = store_with_likes(25);
        let classifier = FakeClassifier::new(vec![]);
        let auditor = Auditor::new(&store, &classifier, 20);

        let outcome = auditor.run(&[CollectionType::Like]).await.unwrap();

        let calls = classifier.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![20, 5]);
        assert!(calls.iter().all(|&n| n <= MAX_BATCH_SIZE));
        assert_eq!(outcome.verdicts.len(), 25);
        assert_eq!(outcome.total_items, 25);
    }

    #[tokio::test]
    async fn test_batch_size_clamped_to_cap() {
        let store = store_with_likes(30);
        let classifier = FakeClassifier::new(vec![]);
        let auditor = Auditor::new(&store, &classifier, 500);

        auditor.run(&[CollectionType::Like]).await.unwrap();

        let calls = classifier.calls.lock().unwrap().clone();
        assert!(calls.iter().all(|&n| n <= MAX_BATCH_SIZE));
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let store = store_with_likes(12);
        let classifier = FakeClassifier::new(vec![]);
        let auditor = Auditor::new(&store, &classifier, 5);

        let outcome = auditor.run(&[CollectionType::Like]).await.unwrap();

        let ids: Vec<&str> = outcome.verdicts.iter().map(|v| v.item_id.as_str()).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("{}", i)).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_abort_run() {
        // Second of two batches fails: 20 verdicts remain, one warning
        let store = store_with_likes(25);
        let classifier = FakeClassifier::new(vec![1]);
        let auditor = Auditor::new(&store, &classifier, 20);

        let outcome = auditor.run(&[CollectionType::Like]).await.unwrap();

        assert_eq!(outcome.verdicts.len(), 20);
        assert_eq!(outcome.failed_batches.len(), 1);
        assert_eq!(outcome.unaudited_items(), 5);
        assert_eq!(outcome.failed_batches[0].first_id, "20");
        assert_eq!(outcome.failed_batches[0].last_id, "24");
        assert_eq!(
            outcome.failed_batches[0].kind,
            ClassificationErrorKind::RateLimited
        );
    }

    #[tokio::test]
    async fn test_empty_collection_skipped() {
        let store = ContentStore::in_memory().unwrap();
        let classifier = FakeClassifier::new(vec![]);
        let auditor = Auditor::new(&store, &classifier, 20);

        let outcome = auditor
            .run(&[CollectionType::Post, CollectionType::Bookmark])
            .await
            .unwrap();

        assert!(classifier.calls.lock().unwrap().is_empty());
        assert!(outcome.verdicts.is_empty());
        assert_eq!(outcome.total_items, 0);
    }

    #[tokio::test]
    async fn test_empty_selection_is_error() {
        let store = ContentStore::in_memory().unwrap();
        let classifier = FakeClassifier::new(vec![]);
        let auditor = Auditor::new(&store, &classifier, 20);

        match auditor.run(&[]).await {
            Err(VetterError::Config(_)) => {}
            other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_text_items_still_sent() {
        let store = ContentStore::in_memory().unwrap();
        for i in 0..3 {
            store
                .upsert_item(&item(&format!("{}", i), CollectionType::Post, ""))
                .unwrap();
        }
        let classifier = FakeClassifier::new(vec![]);
        let auditor = Auditor::new(&store, &classifier, 20);

        let outcome = auditor.run(&[CollectionType::Post]).await.unwrap();
        assert_eq!(outcome.verdicts.len(), 3);
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("clean".parse::<Severity>().unwrap(), Severity::None);
        assert!("severe".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_orders_most_severe_first() {
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
        assert!(Severity::Low < Severity::None);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("NSFW".parse::<Category>().unwrap(), Category::Nsfw);
        assert!("spam".parse::<Category>().is_err());
    }
}
