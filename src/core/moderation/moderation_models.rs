use crate::core::actions::ActionDecision;
use crate::core::classification::ClassificationResult;
use crate::core::precedents::{SimilarCase, DEFAULT_SIMILARITY_THRESHOLD};
use crate::core::risk::RiskAssessment;
use serde::{Deserialize, Serialize};

/// Tunables for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationSettings {
    /// Minimum similarity for a past decision to count as a similar case.
    pub similarity_threshold: f64,
    /// How many similar cases a response carries.
    pub similar_cases_in_response: usize,
    /// Longest accepted submission, in characters.
    pub max_content_chars: usize,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            similar_cases_in_response: 3,
            max_content_chars: 10_000,
        }
    }
}

/// Everything decided about one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationOutcome {
    pub classification: ClassificationResult,
    pub risk_score: RiskAssessment,
    pub action: ActionDecision,
    pub explanation: String,
    pub similar_cases: Vec<SimilarCase>,
}
