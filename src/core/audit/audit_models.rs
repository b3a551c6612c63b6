use crate::core::actions::ActionDecision;
use crate::core::classification::ClassificationResult;
use crate::core::risk::RiskAssessment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one moderation decision.
///
/// Identified by `content_hash`; the raw content itself is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
    pub user_id: String,
    pub classification: ClassificationResult,
    pub risk_score: RiskAssessment,
    pub action_taken: ActionDecision,
    pub explanation: String,
}

/// Aggregate counts over the whole audit log.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_decisions: usize,
    pub high_risk_count: usize,
    /// Rounded to one decimal place.
    pub high_risk_percentage: f64,
    pub medium_risk_count: usize,
    /// Rounded to one decimal place.
    pub medium_risk_percentage: f64,
}
