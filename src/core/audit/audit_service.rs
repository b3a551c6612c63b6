// Audit trail - sole owner and mutator of the decision log.
//
// Lifecycle:
// - `load` reads the full history from the record store once at startup. A
//   missing or unreadable store starts an empty log.
// - `log_decision` appends in memory and rewrites the whole store. A failed
//   write is logged and the entry stays in memory; it may be lost on restart.
// - `flush` rewrites the store on shutdown.
//
// Appends hold the write lock across the store rewrite, so concurrent
// submissions are serialized rather than racing each other's saves.

use super::audit_models::{AuditEntry, AuditStats};
use crate::core::actions::ActionDecision;
use crate::core::classification::ClassificationResult;
use crate::core::records::{content_hash, RecordStore, StoreError};
use crate::core::risk::{RiskAssessment, RiskLevel};
use chrono::Utc;
use tokio::sync::RwLock;

/// Categories at or below this score are left out of explanations.
const EXPLANATION_MIN_SCORE: f64 = 0.3;

pub struct AuditTrail<S: RecordStore<AuditEntry>> {
    store: S,
    log: RwLock<Vec<AuditEntry>>,
}

impl<S: RecordStore<AuditEntry>> AuditTrail<S> {
    /// Create the trail and load existing history from `store`.
    pub async fn load(store: S) -> Self {
        let log = match store.load_all().await {
            Ok(entries) => {
                tracing::info!(count = entries.len(), "Audit log loaded");
                entries
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audit log unreadable, starting with an empty log");
                Vec::new()
            }
        };

        Self {
            store,
            log: RwLock::new(log),
        }
    }

    /// Record a moderation decision.
    pub async fn log_decision(
        &self,
        content: &str,
        user_id: &str,
        classification: &ClassificationResult,
        risk: &RiskAssessment,
        action: &ActionDecision,
        explanation: &str,
    ) -> AuditEntry {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            content_hash: content_hash(content),
            user_id: user_id.to_string(),
            classification: classification.clone(),
            risk_score: risk.clone(),
            action_taken: action.clone(),
            explanation: explanation.to_string(),
        };

        self.append(entry).await
    }

    /// Append a fully-built entry and persist the log.
    pub async fn append(&self, entry: AuditEntry) -> AuditEntry {
        let mut log = self.log.write().await;
        log.push(entry.clone());

        if let Err(e) = self.store.save_all(&log).await {
            tracing::error!(
                content_hash = %entry.content_hash,
                error = %e,
                "Failed to persist audit log; entry kept in memory only"
            );
        }

        tracing::info!(
            content_hash = %entry.content_hash,
            user_id = %entry.user_id,
            level = %entry.risk_score.level,
            score = entry.risk_score.score,
            "Moderation decision logged"
        );
        entry
    }

    /// Counts and shares of High and Medium decisions over the full log.
    pub async fn get_audit_stats(&self) -> AuditStats {
        let log = self.log.read().await;
        let total = log.len();
        if total == 0 {
            return AuditStats::default();
        }

        let count_level = |level: RiskLevel| {
            log.iter()
                .filter(|entry| entry.risk_score.level == level)
                .count()
        };
        let high = count_level(RiskLevel::High);
        let medium = count_level(RiskLevel::Medium);

        AuditStats {
            total_decisions: total,
            high_risk_count: high,
            high_risk_percentage: share_of(high, total),
            medium_risk_count: medium,
            medium_risk_percentage: share_of(medium, total),
        }
    }

    /// Run `f` over the current log under a read lock.
    pub async fn scan<R>(&self, f: impl FnOnce(&[AuditEntry]) -> R) -> R {
        let log = self.log.read().await;
        f(&log)
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    /// Rewrite the backing store with the in-memory log.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let log = self.log.read().await;
        self.store.save_all(&log).await
    }
}

/// Human-readable explanation of a decision.
pub fn generate_explanation(
    classification: &ClassificationResult,
    risk: &RiskAssessment,
) -> String {
    let mut clauses: Vec<String> = classification
        .iter()
        .filter(|(_, score)| *score > EXPLANATION_MIN_SCORE)
        .map(|(category, score)| {
            format!("Detected {} ({} confidence)", category, percent(score))
        })
        .collect();

    if !risk.reasons.is_empty() {
        clauses.push(format!("Risk factors: {}", risk.reasons.join(", ")));
    }

    clauses.push(format!(
        "Overall risk level: {} ({})",
        risk.level,
        percent(risk.score)
    ));

    clauses.join(". ")
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

/// Percentage to one decimal place, ties to even.
fn share_of(count: usize, total: usize) -> f64 {
    let pct = count as f64 * 100.0 / total as f64;
    (pct * 10.0).round_ties_even() / 10.0
}

// ============================================================================
// TESTS
// ============================================================================
