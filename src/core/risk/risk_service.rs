// Risk scorer - aggregates a classification and text heuristics into one
// bounded score and a Low/Medium/High level.
//
// Pure business logic: no I/O, no clock, same input always gives the same
// assessment.

use crate::core::classification::{Category, ClassificationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Fixed bands: `< 0.3` Low, `< 0.7` Medium, otherwise High.
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of risk scoring for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Always within [0, 1].
    pub score: f64,
    /// Always `RiskLevel::from_score(score)`.
    pub level: RiskLevel,
    /// One entry per category that crossed its threshold, in mapping order.
    pub reasons: Vec<String>,
}

impl RiskAssessment {
    /// Build an assessment, clamping the score and deriving the level from it.
    pub fn new(score: f64, reasons: Vec<String>) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self {
            score,
            level: RiskLevel::from_score(score),
            reasons,
        }
    }
}

// ============================================================================
// HEURISTICS
// ============================================================================

const THREAT_WORDS: &[&str] = &["kill", "hurt", "die", "harm", "attack"];
const SOLICITATION_WORDS: &[&str] = &[
    "nude", "naked", "show me", "send", "pics", "photos", "private",
];

const EXTREME_THREAT_PHRASES: &[&str] = &["kill you", "kill myself", "want to die", "suicide"];
const DIRECT_THREAT_PHRASES: &[&str] = &["kill", "murder", "hurt you", "attack you"];
const SEXUAL_REQUEST_PHRASES: &[&str] = &[
    "nude",
    "naked",
    "show me",
    "send pics",
    "sexual",
    "private parts",
];
const REQUEST_PHRASES: &[&str] = &["can you show", "can you send", "want to see", "show your"];
const SEXUAL_QUALIFIERS: &[&str] = &["nude", "naked", "private", "body", "photos"];

/// (phrases that must appear, qualifiers of which one must also appear, floor)
const KEYWORD_FLOORS: &[(&[&str], Option<&[&str]>, f64)] = &[
    (EXTREME_THREAT_PHRASES, None, 0.8),
    (DIRECT_THREAT_PHRASES, None, 0.7),
    (SEXUAL_REQUEST_PHRASES, None, 0.5),
    (REQUEST_PHRASES, Some(SEXUAL_QUALIFIERS), 0.6),
];

fn mentions_any(lower: &str, words: &[&str]) -> bool {
    words.iter().any(|w| lower.contains(w))
}

/// Additive risk from surface features of the text.
pub fn text_characteristics_risk(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let mut risk = 0.0;

    if mentions_any(&lower, THREAT_WORDS) {
        risk += 0.3;
    }
    if mentions_any(&lower, SOLICITATION_WORDS) {
        risk += 0.4;
    }
    let chars = text.chars().count();
    if chars > 200 {
        risk += 0.1;
    }
    if text.matches('!').count() > 2 {
        risk += 0.1;
    }
    if text.to_uppercase() == text && chars > 10 {
        risk += 0.2;
    }

    risk
}

/// Raise `current` to the highest floor any matching phrase set demands.
///
/// Never lowers the score.
pub fn apply_keyword_floors(text: &str, current: f64) -> f64 {
    let lower = text.to_lowercase();
    KEYWORD_FLOORS
        .iter()
        .filter(|(phrases, qualifiers, _)| {
            mentions_any(&lower, phrases)
                && qualifiers.map_or(true, |q| mentions_any(&lower, q))
        })
        .fold(current, |score, (_, _, floor)| score.max(*floor))
}

// ============================================================================
// CORE SERVICE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a classified submission.
    pub fn evaluate_risk(&self, classification: &ClassificationResult, text: &str) -> RiskAssessment {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        for (category, value) in classification.iter() {
            if *category == Category::NormalContent {
                continue;
            }
            if value > category.risk_threshold() {
                score += value * category.risk_weight();
                reasons.push(format!("High {} probability: {:.2}", category, value));
            }
        }

        score += text_characteristics_risk(text);
        score = apply_keyword_floors(text, score);

        let assessment = RiskAssessment::new(score, reasons);
        tracing::debug!(
            score = assessment.score,
            level = %assessment.level,
            "Risk evaluated"
        );
        assessment
    }
}

// ============================================================================
// TESTS
// ============================================================================
