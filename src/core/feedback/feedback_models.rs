use crate::core::classification::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A human verdict on one past decision, correlated by content hash only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
    pub user_id: String,
    pub accurate: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_classification: Option<BTreeMap<Category, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_action: Option<Vec<String>>,
}

/// Input to `FeedbackLoop::record_feedback`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackSubmission {
    pub content: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub accurate: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub expected_classification: Option<BTreeMap<Category, f64>>,
    #[serde(default)]
    pub expected_action: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total_feedback: usize,
    pub accuracy_count: usize,
    pub inaccuracy_count: usize,
    pub accuracy_percentage: f64,
}

/// A misclassified example with the outcome the reviewer expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub content_hash: String,
    pub expected_classification: BTreeMap<Category, f64>,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_action: Option<Vec<String>>,
}
