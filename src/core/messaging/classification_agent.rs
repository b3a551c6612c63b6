use super::message_bus::{BusError, Message, MessageBus, MessageHandler};
use crate::core::classification::CategoryClassifier;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const CLASSIFIER_AGENT_ID: &str = "classifier_agent";
pub const CLASSIFY_TEXT: &str = "classify_text";
pub const CLASSIFICATION_RESULT: &str = "classification_result";

/// Answers `classify_text` messages with a `classification_result` sent back
/// to the original sender.
pub struct ClassificationAgent {
    classifier: Arc<CategoryClassifier>,
}

impl ClassificationAgent {
    pub fn new(classifier: Arc<CategoryClassifier>) -> Self {
        Self { classifier }
    }

    /// Register the agent on `bus` under [`CLASSIFIER_AGENT_ID`].
    pub fn register(self, bus: &MessageBus) {
        bus.register_agent(CLASSIFIER_AGENT_ID, Some(Arc::new(self)));
    }
}

#[async_trait]
impl MessageHandler for ClassificationAgent {
    async fn handle(&self, message: Message, bus: &MessageBus) -> Result<(), BusError> {
        if message.message_type != CLASSIFY_TEXT {
            tracing::debug!(message_type = %message.message_type, "Ignoring message");
            return Ok(());
        }

        let text = message
            .data
            .get("text")
            .and_then(|text| text.as_str())
            .ok_or_else(|| BusError::Handler("classify_text message has no text".to_string()))?;

        let classification = self.classifier.classify(text).await;
        let reply = Message::new(
            CLASSIFIER_AGENT_ID,
            message.sender.clone(),
            CLASSIFICATION_RESULT,
            json!({
                "classification": classification,
                "original_text": text,
            }),
        )
        .with_priority(message.priority);

        if bus.send_message(reply) {
            Ok(())
        } else {
            Err(BusError::UnknownRecipient(message.sender))
        }
    }
}
