use crate::core::actions::ActionDecision;
use crate::core::classification::{Category, ClassificationResult};
use crate::core::risk::RiskAssessment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A historical decision ranked by similarity to the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    pub similarity: f64,
    pub classification: ClassificationResult,
    pub risk_score: RiskAssessment,
    pub action_taken: ActionDecision,
    pub timestamp: DateTime<Utc>,
}

/// A historical decision sharing at least one confident category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precedent {
    pub matching_categories: Vec<Category>,
    pub classification: ClassificationResult,
    pub risk_score: RiskAssessment,
    pub action_taken: ActionDecision,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub total_moderations: usize,
    pub high_risk_count: usize,
    /// Number of decisions in the window where each category scored above 0.5.
    pub common_categories: BTreeMap<Category, usize>,
    pub average_risk_score: f64,
}
