// Precedent retriever - read-only queries over the audit trail's history.
//
// Retrieval runs after the current decision has been appended, so the newest
// entry (the submission itself) is a candidate and usually ranks first.

use super::precedent_models::{Precedent, SimilarCase, TrendAnalysis};
use crate::core::audit::{AuditEntry, AuditTrail};
use crate::core::classification::{Category, ClassificationResult};
use crate::core::records::RecordStore;
use crate::core::risk::RiskLevel;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_TREND_DAYS: u32 = 30;

/// Upper bound on `search_similar_content` results.
pub const MAX_SIMILAR_CASES: usize = 5;

/// Categories scoring above this count towards trend occurrences.
const TREND_CATEGORY_MIN_SCORE: f64 = 0.5;

/// Mean of `min(current, historical)` over categories present in both.
///
/// Returns `None` when the two share no category.
pub fn similarity(current: &ClassificationResult, historical: &ClassificationResult) -> Option<f64> {
    let (sum, shared) = current
        .iter()
        .filter_map(|(category, score)| historical.get(category).map(|h| score.min(h)))
        .fold((0.0, 0usize), |(sum, n), s| (sum + s, n + 1));

    (shared > 0).then(|| sum / shared as f64)
}

/// Skip entries whose stored classification can't be used for scoring.
fn usable(entry: &AuditEntry) -> bool {
    if entry.classification.is_well_formed() {
        true
    } else {
        tracing::warn!(
            content_hash = %entry.content_hash,
            "Skipping malformed historical record"
        );
        false
    }
}

pub fn rank_similar(
    entries: &[AuditEntry],
    current: &ClassificationResult,
    threshold: f64,
) -> Vec<SimilarCase> {
    let mut cases: Vec<SimilarCase> = entries
        .iter()
        .filter(|entry| usable(entry))
        .filter_map(|entry| {
            let score = similarity(current, &entry.classification)?;
            (score >= threshold).then(|| SimilarCase {
                similarity: score,
                classification: entry.classification.clone(),
                risk_score: entry.risk_score.clone(),
                action_taken: entry.action_taken.clone(),
                timestamp: entry.timestamp,
            })
        })
        .collect();

    // Stable sort: equally similar cases keep log order.
    cases.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    cases.truncate(MAX_SIMILAR_CASES);
    cases
}

pub fn match_precedents(
    entries: &[AuditEntry],
    current: &ClassificationResult,
    min_confidence: f64,
) -> Vec<Precedent> {
    entries
        .iter()
        .filter(|entry| usable(entry))
        .filter_map(|entry| {
            let matching: Vec<Category> = current
                .iter()
                .filter(|(category, score)| {
                    *score >= min_confidence && entry.classification.score(category) >= min_confidence
                })
                .map(|(category, _)| category.clone())
                .collect();

            (!matching.is_empty()).then(|| Precedent {
                matching_categories: matching,
                classification: entry.classification.clone(),
                risk_score: entry.risk_score.clone(),
                action_taken: entry.action_taken.clone(),
                timestamp: entry.timestamp,
            })
        })
        .collect()
}

pub fn summarize_trends(entries: &[AuditEntry], now: DateTime<Utc>, days: u32) -> TrendAnalysis {
    // A window reaching past the representable range has no lower bound.
    let cutoff = Duration::try_days(i64::from(days)).and_then(|span| now.checked_sub_signed(span));
    let window: Vec<&AuditEntry> = entries
        .iter()
        .filter(|entry| cutoff.map_or(true, |cutoff| entry.timestamp >= cutoff))
        .filter(|entry| usable(entry))
        .collect();

    if window.is_empty() {
        return TrendAnalysis::default();
    }

    let mut trends = TrendAnalysis {
        total_moderations: window.len(),
        ..TrendAnalysis::default()
    };

    let mut score_sum = 0.0;
    for entry in &window {
        if entry.risk_score.level == RiskLevel::High {
            trends.high_risk_count += 1;
        }
        score_sum += entry.risk_score.score;

        for (category, score) in entry.classification.iter() {
            if score > TREND_CATEGORY_MIN_SCORE {
                *trends.common_categories.entry(category.clone()).or_insert(0) += 1;
            }
        }
    }
    trends.average_risk_score = score_sum / window.len() as f64;

    trends
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct PrecedentRetriever<S: RecordStore<AuditEntry>> {
    audit: Arc<AuditTrail<S>>,
}

impl<S: RecordStore<AuditEntry>> PrecedentRetriever<S> {
    pub fn new(audit: Arc<AuditTrail<S>>) -> Self {
        Self { audit }
    }

    /// Up to five historical cases with similarity at or above `threshold`,
    /// most similar first.
    pub async fn search_similar_content(
        &self,
        classification: &ClassificationResult,
        threshold: f64,
    ) -> Vec<SimilarCase> {
        self.audit
            .scan(|entries| rank_similar(entries, classification, threshold))
            .await
    }

    /// Every historical entry sharing a category where both sides reach
    /// `min_confidence`, in log order.
    pub async fn retrieve_precedents(
        &self,
        classification: &ClassificationResult,
        min_confidence: f64,
    ) -> Vec<Precedent> {
        self.audit
            .scan(|entries| match_precedents(entries, classification, min_confidence))
            .await
    }

    pub async fn get_trend_analysis(&self, days: u32) -> TrendAnalysis {
        self.get_trend_analysis_at(Utc::now(), days).await
    }

    pub async fn get_trend_analysis_at(&self, now: DateTime<Utc>, days: u32) -> TrendAnalysis {
        self.audit
            .scan(|entries| summarize_trends(entries, now, days))
            .await
    }
}

// ============================================================================
// TESTS
// ============================================================================
