// Feedback loop - owns the feedback log the same way the audit trail owns the
// decision log: loaded once at startup, rewritten in full after each append,
// failed writes logged and kept in memory.

use super::feedback_models::{FeedbackRecord, FeedbackStats, FeedbackSubmission, TrainingExample};
use crate::core::moderation::ANONYMOUS_USER;
use crate::core::records::{content_hash, RecordStore, StoreError};
use chrono::Utc;
use tokio::sync::RwLock;

pub const DEFAULT_RECENT_FEEDBACK: usize = 10;

pub struct FeedbackLoop<S: RecordStore<FeedbackRecord>> {
    store: S,
    records: RwLock<Vec<FeedbackRecord>>,
}

impl<S: RecordStore<FeedbackRecord>> FeedbackLoop<S> {
    pub async fn load(store: S) -> Self {
        let records = match store.load_all().await {
            Ok(records) => {
                tracing::info!(count = records.len(), "Feedback log loaded");
                records
            }
            Err(e) => {
                tracing::warn!(error = %e, "Feedback log unreadable, starting with an empty log");
                Vec::new()
            }
        };

        Self {
            store,
            records: RwLock::new(records),
        }
    }

    /// Record a verdict. There is no check that a matching decision exists.
    pub async fn record_feedback(&self, submission: FeedbackSubmission) -> FeedbackRecord {
        let record = FeedbackRecord {
            timestamp: Utc::now(),
            content_hash: content_hash(&submission.content),
            user_id: submission
                .user_id
                .unwrap_or_else(|| ANONYMOUS_USER.to_string()),
            accurate: submission.accurate,
            notes: submission.notes,
            expected_classification: submission
                .expected_classification
                .filter(|expected| !expected.is_empty()),
            expected_action: submission
                .expected_action
                .filter(|expected| !expected.is_empty()),
        };

        let mut records = self.records.write().await;
        records.push(record.clone());

        if let Err(e) = self.store.save_all(&records).await {
            tracing::error!(
                content_hash = %record.content_hash,
                error = %e,
                "Failed to persist feedback log; record kept in memory only"
            );
        }

        tracing::info!(
            content_hash = %record.content_hash,
            accurate = record.accurate,
            "Feedback recorded"
        );
        record
    }

    pub async fn get_feedback_stats(&self) -> FeedbackStats {
        let records = self.records.read().await;
        let total = records.len();
        if total == 0 {
            return FeedbackStats::default();
        }

        let accurate = records.iter().filter(|r| r.accurate).count();
        FeedbackStats {
            total_feedback: total,
            accuracy_count: accurate,
            inaccuracy_count: total - accurate,
            accuracy_percentage: accurate as f64 / total as f64 * 100.0,
        }
    }

    /// Inaccurate verdicts that say what the classification should have been.
    pub async fn export_training_data(&self) -> Vec<TrainingExample> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| !r.accurate)
            .filter_map(|r| {
                let expected = r.expected_classification.clone()?;
                Some(TrainingExample {
                    content_hash: r.content_hash.clone(),
                    expected_classification: expected,
                    notes: r.notes.clone(),
                    expected_action: r.expected_action.clone(),
                })
            })
            .collect()
    }

    /// Newest first. Records sharing a timestamp come back latest-recorded first.
    pub async fn get_recent_feedback(&self, limit: usize) -> Vec<FeedbackRecord> {
        let records = self.records.read().await;
        let mut recent: Vec<FeedbackRecord> = records.iter().rev().cloned().collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);
        recent
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        let records = self.records.read().await;
        self.store.save_all(&records).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classification::Category;
    use crate::infra::records::{InMemoryRecordStore, JsonRecordStore};
    use chrono::Duration;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn verdict(content: &str, accurate: bool) -> FeedbackSubmission {
        FeedbackSubmission {
            content: content.to_string(),
            accurate,
            ..FeedbackSubmission::default()
        }
    }

    fn expected(category: Category, score: f64) -> BTreeMap<Category, f64> {
        BTreeMap::from([(category, score)])
    }

    #[tokio::test]
    async fn empty_stats_are_zero() {
        let feedback = FeedbackLoop::load(InMemoryRecordStore::new()).await;
        assert_eq!(feedback.get_feedback_stats().await, FeedbackStats::default());
    }

    #[tokio::test]
    async fn stats_count_verdicts() {
        let feedback = FeedbackLoop::load(InMemoryRecordStore::new()).await;
        feedback.record_feedback(verdict("a", true)).await;
        feedback.record_feedback(verdict("b", true)).await;
        feedback.record_feedback(verdict("c", true)).await;
        feedback.record_feedback(verdict("d", false)).await;

        let stats = feedback.get_feedback_stats().await;
        assert_eq!(stats.total_feedback, 4);
        assert_eq!(stats.accuracy_count, 3);
        assert_eq!(stats.inaccuracy_count, 1);
        assert_eq!(stats.accuracy_percentage, 75.0);
    }

    #[tokio::test]
    async fn record_defaults_user_and_hashes_content() {
        let feedback = FeedbackLoop::load(InMemoryRecordStore::new()).await;
        let record = feedback.record_feedback(verdict("some post", true)).await;

        assert_eq!(record.user_id, ANONYMOUS_USER);
        assert_eq!(record.content_hash, content_hash("some post"));
    }

    #[tokio::test]
    async fn training_data_needs_inaccurate_verdict_with_expectation() {
        let feedback = FeedbackLoop::load(InMemoryRecordStore::new()).await;

        feedback.record_feedback(verdict("no expectation", false)).await;
        feedback
            .record_feedback(FeedbackSubmission {
                expected_classification: Some(expected(Category::Spam, 0.9)),
                ..verdict("accurate anyway", true)
            })
            .await;
        feedback
            .record_feedback(FeedbackSubmission {
                expected_classification: Some(BTreeMap::new()),
                ..verdict("empty expectation", false)
            })
            .await;
        feedback
            .record_feedback(FeedbackSubmission {
                notes: "this is spam".to_string(),
                expected_classification: Some(expected(Category::Spam, 0.9)),
                expected_action: Some(vec!["remove content".to_string()]),
                ..verdict("buy cheap pills", false)
            })
            .await;

        let examples = feedback.export_training_data().await;
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].content_hash, content_hash("buy cheap pills"));
        assert_eq!(examples[0].notes, "this is spam");
        assert_eq!(examples[0].expected_classification, expected(Category::Spam, 0.9));
        assert_eq!(
            examples[0].expected_action,
            Some(vec!["remove content".to_string()])
        );
    }

    #[tokio::test]
    async fn recent_feedback_is_newest_first() {
        let now = Utc::now();
        let at = |minutes_ago: i64, hash: &str| FeedbackRecord {
            timestamp: now - Duration::minutes(minutes_ago),
            content_hash: hash.to_string(),
            user_id: ANONYMOUS_USER.to_string(),
            accurate: true,
            notes: String::new(),
            expected_classification: None,
            expected_action: None,
        };
        let store = InMemoryRecordStore::with_records(vec![at(5, "old"), at(1, "new"), at(3, "mid")]);
        let feedback = FeedbackLoop::load(store).await;

        let recent = feedback.get_recent_feedback(2).await;
        let hashes: Vec<&str> = recent.iter().map(|r| r.content_hash.as_str()).collect();
        assert_eq!(hashes, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn feedback_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback_data.json");

        let feedback = FeedbackLoop::load(JsonRecordStore::new(&path)).await;
        let written = feedback
            .record_feedback(FeedbackSubmission {
                user_id: Some("mod-7".to_string()),
                notes: "missed it".to_string(),
                expected_classification: Some(expected(Category::Violence, 0.8)),
                ..verdict("I will hurt you", false)
            })
            .await;
        drop(feedback);

        let reloaded = FeedbackLoop::load(JsonRecordStore::<FeedbackRecord>::new(&path)).await;
        assert_eq!(reloaded.len().await, 1);
        assert_eq!(reloaded.get_recent_feedback(1).await, vec![written]);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_record() {
        let store = InMemoryRecordStore::new();
        store.fail_writes(true);
        let feedback = FeedbackLoop::load(store).await;

        feedback.record_feedback(verdict("x", false)).await;
        assert_eq!(feedback.get_feedback_stats().await.total_feedback, 1);
    }
}
