// Action resolver - maps a risk assessment and classification onto an ordered
// list of remediation actions.
//
// Base actions come from the policy table for the risk level; conditional
// actions are appended afterwards and never replace the base list. The same
// action may appear twice (e.g. "add content warning" for Medium sexual
// content); repetition is kept as-is for downstream consumers.

use crate::core::classification::{Category, ClassificationResult};
use crate::core::risk::{RiskAssessment, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Used when the policy table has no entry for a level.
pub const FALLBACK_ACTION: &str = "review manually";

const EXPLICIT_REQUEST_WORDS: &[&str] = &["nude", "naked", "send pics", "show me"];

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecision {
    pub actions: Vec<String>,
    pub explanation: String,
}

/// Fixed mapping from risk level to base remediation actions.
#[derive(Debug, Clone)]
pub struct ActionPolicy {
    table: HashMap<RiskLevel, Vec<String>>,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(RiskLevel::Low, to_owned(&["no action", "allow content"]));
        table.insert(
            RiskLevel::Medium,
            to_owned(&["flag for review", "notify moderator", "add content warning"]),
        );
        table.insert(
            RiskLevel::High,
            to_owned(&[
                "remove content",
                "notify administrator",
                "temporary ban user",
                "report to authorities",
            ]),
        );
        Self { table }
    }
}

impl ActionPolicy {
    /// A policy with no levels configured; every level resolves to manual review.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn with_actions(mut self, level: RiskLevel, actions: &[&str]) -> Self {
        self.table.insert(level, to_owned(actions));
        self
    }

    /// Base actions for a level. Always a fresh list.
    pub fn base_actions(&self, level: RiskLevel) -> Vec<String> {
        self.table
            .get(&level)
            .cloned()
            .unwrap_or_else(|| vec![FALLBACK_ACTION.to_string()])
    }
}

fn to_owned(actions: &[&str]) -> Vec<String> {
    actions.iter().map(|a| a.to_string()).collect()
}

// ============================================================================
// CORE SERVICE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ActionResolver {
    policy: ActionPolicy,
}

impl ActionResolver {
    pub fn new(policy: ActionPolicy) -> Self {
        Self { policy }
    }

    pub fn determine_action(
        &self,
        risk: &RiskAssessment,
        classification: &ClassificationResult,
        text: &str,
    ) -> ActionDecision {
        let mut actions = self.policy.base_actions(risk.level);

        if classification.score(&Category::SelfHarm) > 0.6 {
            actions.push("provide mental health resources".to_string());
        }

        if classification.score(&Category::Violence) > 0.7 {
            actions.push("report to authorities if credible threat".to_string());
        }

        let sexual = classification.score(&Category::SexualContent);
        if sexual > 0.5 {
            match risk.level {
                RiskLevel::Medium => actions.extend(to_owned(&[
                    "add content warning",
                    "review by human moderator",
                ])),
                RiskLevel::High => actions.extend(to_owned(&[
                    "remove content immediately",
                    "notify platform safety team",
                ])),
                RiskLevel::Low => {}
            }
        }

        let lower = text.to_lowercase();
        if sexual > 0.4 && EXPLICIT_REQUEST_WORDS.iter().any(|w| lower.contains(w)) {
            actions.push("escalate to senior moderator".to_string());
        }

        ActionDecision {
            actions,
            explanation: format!("Risk level: {} ({:.2})", risk.level, risk.score),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
