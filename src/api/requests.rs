use crate::core::feedback::FeedbackSubmission;
use serde::Deserialize;

/// One request, tagged by `type`.
///
/// ```json
/// {"type": "moderate", "content": "...", "user_id": "u1"}
/// {"type": "feedback", "content": "...", "accurate": false, "notes": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiRequest {
    Moderate {
        content: Option<String>,
        user_id: Option<String>,
    },
    AuditStats,
    Feedback(FeedbackSubmission),
    FeedbackStats,
    RecentFeedback {
        limit: Option<usize>,
    },
    TrainingData,
    TrendAnalysis {
        days: Option<u32>,
    },
    Precedents {
        content: Option<String>,
        min_confidence: Option<f64>,
    },
    /// Classify without recording anything, routed through the message bus.
    Classify {
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_requests() {
        let request: ApiRequest =
            serde_json::from_str(r#"{"type": "moderate", "content": "hi"}"#).unwrap();
        assert_eq!(
            request,
            ApiRequest::Moderate {
                content: Some("hi".to_string()),
                user_id: None
            }
        );

        let request: ApiRequest = serde_json::from_str(r#"{"type": "audit_stats"}"#).unwrap();
        assert_eq!(request, ApiRequest::AuditStats);
    }

    #[test]
    fn feedback_carries_optional_expectations() {
        let request: ApiRequest = serde_json::from_str(
            r#"{"type": "feedback", "content": "x", "accurate": false,
                "expected_classification": {"spam": 0.9}, "expected_action": ["remove content"]}"#,
        )
        .unwrap();

        match request {
            ApiRequest::Feedback(submission) => {
                assert!(!submission.accurate);
                assert_eq!(submission.notes, "");
                assert_eq!(submission.expected_classification.unwrap().len(), 1);
                assert_eq!(submission.expected_action.unwrap(), vec!["remove content"]);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ApiRequest>(r#"{"type": "shutdown"}"#).is_err());
    }
}
