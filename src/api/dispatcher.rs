use super::requests::ApiRequest;
use crate::core::audit::AuditEntry;
use crate::core::feedback::{FeedbackLoop, FeedbackRecord, DEFAULT_RECENT_FEEDBACK};
use crate::core::messaging::{
    BusError, Message, MessageBus, CLASSIFIER_AGENT_ID, CLASSIFY_TEXT,
};
use crate::core::moderation::{ModerationError, ModerationService};
use crate::core::precedents::{DEFAULT_MIN_CONFIDENCE, DEFAULT_TREND_DAYS};
use crate::core::records::RecordStore;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const API_SENDER: &str = "api";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Malformed request: {0}")]
    BadRequest(#[from] serde_json::Error),

    #[error(transparent)]
    Moderation(#[from] ModerationError),

    #[error("Message bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn to_response(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

pub struct Dispatcher<A, F>
where
    A: RecordStore<AuditEntry>,
    F: RecordStore<FeedbackRecord>,
{
    moderation: Arc<ModerationService<A>>,
    feedback: Arc<FeedbackLoop<F>>,
    bus: MessageBus,
    bus_timeout: Duration,
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field.ok_or_else(|| {
        ModerationError::InvalidSubmission(format!("missing required field `{}`", name)).into()
    })
}

impl<A, F> Dispatcher<A, F>
where
    A: RecordStore<AuditEntry> + 'static,
    F: RecordStore<FeedbackRecord> + 'static,
{
    pub fn new(
        moderation: Arc<ModerationService<A>>,
        feedback: Arc<FeedbackLoop<F>>,
        bus: MessageBus,
        bus_timeout: Duration,
    ) -> Self {
        Self {
            moderation,
            feedback,
            bus,
            bus_timeout,
        }
    }

    /// Parse and handle one request line. Always produces a JSON response;
    /// failures become `{"error": ...}`.
    pub async fn handle_line(&self, line: &str) -> Value {
        let result = match serde_json::from_str::<ApiRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => Err(ApiError::from(e)),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Request failed");
            e.to_response()
        })
    }

    /// Handle `line` on its own task so a panic while serving it is reported
    /// as an error response instead of taking the caller down.
    pub async fn handle_line_isolated(self: Arc<Self>, line: String) -> Value {
        let task = tokio::spawn(async move { self.handle_line(&line).await });
        match task.await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Request handler panicked");
                ApiError::Internal("request could not be processed".to_string()).to_response()
            }
        }
    }

    pub async fn handle(&self, request: ApiRequest) -> Result<Value, ApiError> {
        match request {
            ApiRequest::Moderate { content, user_id } => {
                let content = required(content, "content")?;
                let outcome = self
                    .moderation
                    .moderate(&content, user_id.as_deref())
                    .await?;
                to_json(&outcome)
            }
            ApiRequest::AuditStats => to_json(&self.moderation.audit_stats().await),
            ApiRequest::Feedback(submission) => {
                self.feedback.record_feedback(submission).await;
                Ok(json!({ "status": "success" }))
            }
            ApiRequest::FeedbackStats => to_json(&self.feedback.get_feedback_stats().await),
            ApiRequest::RecentFeedback { limit } => {
                let limit = limit.unwrap_or(DEFAULT_RECENT_FEEDBACK);
                to_json(&self.feedback.get_recent_feedback(limit).await)
            }
            ApiRequest::TrainingData => to_json(&self.feedback.export_training_data().await),
            ApiRequest::TrendAnalysis { days } => {
                let days = days.unwrap_or(DEFAULT_TREND_DAYS);
                to_json(&self.moderation.trend_analysis(days).await)
            }
            ApiRequest::Precedents {
                content,
                min_confidence,
            } => {
                let content = required(content, "content")?;
                let min_confidence = min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE);
                let precedents = self
                    .moderation
                    .find_precedents(&content, min_confidence)
                    .await?;
                to_json(&precedents)
            }
            ApiRequest::Classify { text } => {
                let message = Message::new(
                    API_SENDER,
                    CLASSIFIER_AGENT_ID,
                    CLASSIFY_TEXT,
                    json!({ "text": text }),
                );
                let reply = self.bus.request(message, self.bus_timeout).await?;
                Ok(reply.data)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit::AuditTrail;
    use crate::core::classification::CategoryClassifier;
    use crate::core::messaging::ClassificationAgent;
    use crate::core::moderation::ModerationSettings;
    use crate::infra::records::InMemoryRecordStore;

    type TestDispatcher =
        Dispatcher<InMemoryRecordStore<AuditEntry>, InMemoryRecordStore<FeedbackRecord>>;

    async fn dispatcher() -> TestDispatcher {
        let classifier = Arc::new(CategoryClassifier::rule_based());
        let audit = Arc::new(AuditTrail::load(InMemoryRecordStore::new()).await);
        let feedback = Arc::new(FeedbackLoop::load(InMemoryRecordStore::new()).await);
        let moderation = Arc::new(ModerationService::new(
            Arc::clone(&classifier),
            audit,
            ModerationSettings::default(),
        ));

        let bus = MessageBus::new(Duration::from_millis(5));
        ClassificationAgent::new(classifier).register(&bus);
        bus.start_processing();

        Dispatcher::new(moderation, feedback, bus, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn moderate_returns_full_decision() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"type": "moderate", "content": "I will kill you", "user_id": "u1"}"#)
            .await;

        assert_eq!(response["risk_score"]["level"], "High");
        assert!(response["classification"]["normal content"].is_number());
        assert!(response["action"]["actions"]
            .as_array()
            .unwrap()
            .contains(&json!("remove content")));
        assert!(response["explanation"].is_string());
        // Self-similarity is (0.6 + 0.4) / 2, under the default 0.6 threshold.
        assert!(response["similar_cases"].as_array().unwrap().is_empty());

        let keys: Vec<&String> = response["classification"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["violence", "normal content"]);
    }

    #[tokio::test]
    async fn normal_content_matches_itself() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"type": "moderate", "content": "Lovely weather today"}"#)
            .await;

        let cases = response["similar_cases"].as_array().unwrap();
        assert_eq!(cases.len(), 1);
        assert!((cases[0]["similarity"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_content_is_an_error_response() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"type": "moderate", "user_id": "u1"}"#)
            .await;

        let error = response["error"].as_str().unwrap();
        assert!(error.contains("content"));
    }

    #[tokio::test]
    async fn malformed_json_is_an_error_response() {
        let dispatcher = dispatcher().await;
        let response = dispatcher.handle_line("{not json").await;
        assert!(response["error"].as_str().unwrap().starts_with("Malformed request"));
    }

    #[tokio::test]
    async fn audit_stats_reflect_moderations() {
        let dispatcher = dispatcher().await;
        dispatcher
            .handle_line(r#"{"type": "moderate", "content": "I will kill you"}"#)
            .await;
        dispatcher
            .handle_line(r#"{"type": "moderate", "content": "FREE OFFER CLICK NOW TO WIN!!!"}"#)
            .await;

        let stats = dispatcher.handle_line(r#"{"type": "audit_stats"}"#).await;
        assert_eq!(
            stats,
            json!({
                "total_decisions": 2,
                "high_risk_count": 1,
                "high_risk_percentage": 50.0,
                "medium_risk_count": 1,
                "medium_risk_percentage": 50.0,
            })
        );
    }

    #[tokio::test]
    async fn feedback_round_trip() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"type": "feedback", "content": "x", "accurate": true}"#)
            .await;
        assert_eq!(response, json!({ "status": "success" }));

        dispatcher
            .handle_line(
                r#"{"type": "feedback", "content": "y", "accurate": false,
                    "notes": "spam", "expected_classification": {"spam": 0.9}}"#,
            )
            .await;

        let stats = dispatcher.handle_line(r#"{"type": "feedback_stats"}"#).await;
        assert_eq!(stats["total_feedback"], 2);
        assert_eq!(stats["accuracy_percentage"], 50.0);

        let training = dispatcher.handle_line(r#"{"type": "training_data"}"#).await;
        assert_eq!(training.as_array().unwrap().len(), 1);
        assert_eq!(training[0]["expected_classification"]["spam"], 0.9);

        let recent = dispatcher
            .handle_line(r#"{"type": "recent_feedback", "limit": 1}"#)
            .await;
        assert_eq!(recent.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn feedback_without_verdict_is_rejected() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"type": "feedback", "content": "x"}"#)
            .await;
        assert!(response["error"].as_str().unwrap().contains("accurate"));
    }

    #[tokio::test]
    async fn classify_goes_through_the_bus() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .handle_line(r#"{"type": "classify", "text": "buy now, free prize"}"#)
            .await;

        assert_eq!(response["original_text"], "buy now, free prize");
        assert!(response["classification"]["spam"].as_f64().unwrap() > 0.0);

        let stats = dispatcher.handle_line(r#"{"type": "audit_stats"}"#).await;
        assert_eq!(stats["total_decisions"], 0);
    }

    #[tokio::test]
    async fn trends_and_precedents_use_defaults() {
        let dispatcher = dispatcher().await;
        dispatcher
            .handle_line(r#"{"type": "moderate", "content": "I will kill you"}"#)
            .await;

        let trends = dispatcher.handle_line(r#"{"type": "trend_analysis"}"#).await;
        assert_eq!(trends["total_moderations"], 1);
        assert_eq!(trends["high_risk_count"], 1);

        let all_time = dispatcher
            .handle_line(r#"{"type": "trend_analysis", "days": 4294967295}"#)
            .await;
        assert!(all_time.get("error").is_none());
        assert_eq!(all_time["total_moderations"], 1);

        let precedents = dispatcher
            .handle_line(r#"{"type": "precedents", "content": "he will kill him"}"#)
            .await;
        assert_eq!(precedents.as_array().unwrap().len(), 1);
        assert_eq!(precedents[0]["matching_categories"], json!(["violence"]));
    }

    #[tokio::test]
    async fn isolated_handling_returns_response() {
        let dispatcher = Arc::new(dispatcher().await);
        let response = dispatcher
            .handle_line_isolated(r#"{"type": "feedback_stats"}"#.to_string())
            .await;
        assert_eq!(response["total_feedback"], 0);
    }
}
