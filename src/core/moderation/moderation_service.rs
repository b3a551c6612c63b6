// Moderation service - orchestrates the decision pipeline.
//
// Per submission, strictly in order:
// 1. classify the text
// 2. score risk
// 3. resolve actions
// 4. explain and append to the audit trail
// 5. look up similar past decisions (including the one just appended)
//
// Nothing after validation can fail: the classifier falls back on its own and
// audit persistence failures are logged inside the trail.

use super::moderation_models::{ModerationOutcome, ModerationSettings};
use crate::core::actions::ActionResolver;
use crate::core::audit::{generate_explanation, AuditEntry, AuditStats, AuditTrail};
use crate::core::classification::CategoryClassifier;
use crate::core::precedents::{Precedent, PrecedentRetriever, TrendAnalysis};
use crate::core::records::RecordStore;
use crate::core::risk::RiskScorer;
use std::sync::Arc;
use thiserror::Error;

pub const ANONYMOUS_USER: &str = "anonymous";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<A: RecordStore<AuditEntry>> {
    classifier: Arc<CategoryClassifier>,
    scorer: RiskScorer,
    resolver: ActionResolver,
    audit: Arc<AuditTrail<A>>,
    precedents: PrecedentRetriever<A>,
    settings: ModerationSettings,
}

impl<A: RecordStore<AuditEntry>> ModerationService<A> {
    pub fn new(
        classifier: Arc<CategoryClassifier>,
        audit: Arc<AuditTrail<A>>,
        settings: ModerationSettings,
    ) -> Self {
        Self {
            classifier,
            scorer: RiskScorer::new(),
            resolver: ActionResolver::default(),
            precedents: PrecedentRetriever::new(Arc::clone(&audit)),
            audit,
            settings,
        }
    }

    fn validate(&self, content: &str) -> Result<(), ModerationError> {
        if content.trim().is_empty() {
            return Err(ModerationError::InvalidSubmission(
                "content must not be empty".to_string(),
            ));
        }

        let chars = content.chars().count();
        if chars > self.settings.max_content_chars {
            return Err(ModerationError::InvalidSubmission(format!(
                "content is {} characters, limit is {}",
                chars, self.settings.max_content_chars
            )));
        }

        Ok(())
    }

    /// Run a submission through the whole pipeline.
    pub async fn moderate(
        &self,
        content: &str,
        user_id: Option<&str>,
    ) -> Result<ModerationOutcome, ModerationError> {
        self.validate(content)?;
        let user_id = user_id.unwrap_or(ANONYMOUS_USER);

        let classification = self.classifier.classify(content).await;
        let risk = self.scorer.evaluate_risk(&classification, content);
        let action = self.resolver.determine_action(&risk, &classification, content);
        let explanation = generate_explanation(&classification, &risk);

        self.audit
            .log_decision(content, user_id, &classification, &risk, &action, &explanation)
            .await;

        let mut similar_cases = self
            .precedents
            .search_similar_content(&classification, self.settings.similarity_threshold)
            .await;
        similar_cases.truncate(self.settings.similar_cases_in_response);

        Ok(ModerationOutcome {
            classification,
            risk_score: risk,
            action,
            explanation,
            similar_cases,
        })
    }

    /// Classify `content` and list past decisions sharing a confident category.
    ///
    /// Read-only: nothing is appended to the audit trail.
    pub async fn find_precedents(
        &self,
        content: &str,
        min_confidence: f64,
    ) -> Result<Vec<Precedent>, ModerationError> {
        self.validate(content)?;
        let classification = self.classifier.classify(content).await;
        Ok(self
            .precedents
            .retrieve_precedents(&classification, min_confidence)
            .await)
    }

    pub async fn trend_analysis(&self, days: u32) -> TrendAnalysis {
        self.precedents.get_trend_analysis(days).await
    }

    pub async fn audit_stats(&self) -> AuditStats {
        self.audit.get_audit_stats().await
    }
}

// ============================================================================
// TESTS
// ============================================================================
