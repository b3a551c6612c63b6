// In-process message bus - per-agent mailboxes polled by a background task.
//
// Delivery is at-most-once and best-effort: queued messages are lost when
// the process exits, and there is no ordering across different mailboxes.
// Each handler invocation runs in its own task, so a slow, failing or
// panicking handler never holds up the other mailboxes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum BusError {
    #[error("No agent registered as {0}")]
    UnknownRecipient(String),

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("No reply within {0:?}")]
    Timeout(Duration),
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub sender: String,
    pub recipient: String,
    pub message_type: String,
    pub data: Value,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message_type: impl Into<String>,
        data: Value,
    ) -> Self {
        let sender = sender.into();
        let recipient = recipient.into();
        let timestamp = Utc::now();
        Self {
            message_id: format!("{}_{}_{}", sender, recipient, timestamp.timestamp_micros()),
            sender,
            recipient,
            message_type: message_type.into(),
            data,
            priority: Priority::default(),
            timestamp,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================================
// HANDLER TRAIT (PORT)
// ============================================================================

/// Consumer of the messages delivered to one agent's mailbox.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message, bus: &MessageBus) -> Result<(), BusError>;
}

// ============================================================================
// BUS
// ============================================================================

struct Mailbox {
    sender: mpsc::UnboundedSender<Message>,
    receiver: Mutex<mpsc::UnboundedReceiver<Message>>,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl Mailbox {
    fn new(handler: Option<Arc<dyn MessageHandler>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            handler,
        }
    }
}

struct BusInner {
    mailboxes: DashMap<String, Arc<Mailbox>>,
    /// message type -> subscribed agent ids
    subscriptions: DashMap<String, Vec<String>>,
    running: AtomicBool,
    poll_interval: Duration,
    worker: StdMutex<Option<JoinHandle<()>>>,
    next_reply_id: AtomicU64,
}

/// Cheap to clone; every clone talks to the same mailboxes.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl MessageBus {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                mailboxes: DashMap::new(),
                subscriptions: DashMap::new(),
                running: AtomicBool::new(false),
                poll_interval,
                worker: StdMutex::new(None),
                next_reply_id: AtomicU64::new(0),
            }),
        }
    }

    /// Give `agent_id` a fresh mailbox. Re-registering drops anything queued.
    ///
    /// A mailbox without a handler is never polled; its owner pulls messages
    /// with `try_receive` or `receive`.
    pub fn register_agent(&self, agent_id: &str, handler: Option<Arc<dyn MessageHandler>>) {
        self.inner
            .mailboxes
            .insert(agent_id.to_string(), Arc::new(Mailbox::new(handler)));
        tracing::debug!(agent_id, "Agent registered");
    }

    pub fn unregister_agent(&self, agent_id: &str) -> bool {
        for mut subscribers in self.inner.subscriptions.iter_mut() {
            subscribers.retain(|id| id != agent_id);
        }
        self.inner.mailboxes.remove(agent_id).is_some()
    }

    pub fn is_registered(&self, agent_id: &str) -> bool {
        self.inner.mailboxes.contains_key(agent_id)
    }

    /// Subscribe an agent to broadcasts of `message_type`.
    pub fn subscribe(&self, agent_id: &str, message_type: &str) {
        let mut subscribers = self
            .inner
            .subscriptions
            .entry(message_type.to_string())
            .or_default();
        if !subscribers.iter().any(|id| id == agent_id) {
            subscribers.push(agent_id.to_string());
        }
    }

    /// Queue a message for its recipient. False when the recipient is unknown.
    pub fn send_message(&self, message: Message) -> bool {
        let mailbox = match self.inner.mailboxes.get(&message.recipient) {
            Some(mailbox) => Arc::clone(mailbox.value()),
            None => {
                tracing::debug!(recipient = %message.recipient, "Dropping message for unknown agent");
                return false;
            }
        };
        mailbox.sender.send(message).is_ok()
    }

    /// Send a copy to every subscriber of `message_type`.
    ///
    /// False when nobody subscribes to that type.
    pub fn broadcast(&self, message_type: &str, data: Value, sender: &str, priority: Priority) -> bool {
        let subscribers = match self.inner.subscriptions.get(message_type) {
            Some(subscribers) if !subscribers.is_empty() => subscribers.value().clone(),
            _ => return false,
        };

        for agent_id in subscribers {
            let message =
                Message::new(sender, agent_id, message_type, data.clone()).with_priority(priority);
            self.send_message(message);
        }
        true
    }

    /// Take the next queued message for `agent_id` without waiting.
    pub async fn try_receive(&self, agent_id: &str) -> Option<Message> {
        let mailbox = self.mailbox(agent_id)?;
        let mut receiver = mailbox.receiver.lock().await;
        receiver.try_recv().ok()
    }

    /// Wait up to `wait` for the next message for `agent_id`.
    pub async fn receive(&self, agent_id: &str, wait: Duration) -> Result<Message, BusError> {
        let mailbox = self
            .mailbox(agent_id)
            .ok_or_else(|| BusError::UnknownRecipient(agent_id.to_string()))?;
        let mut receiver = mailbox.receiver.lock().await;
        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(BusError::UnknownRecipient(agent_id.to_string())),
            Err(_) => Err(BusError::Timeout(wait)),
        }
    }

    /// Send `message` and wait for the first message addressed back to it.
    ///
    /// The sender is rewritten to a one-off reply mailbox, so concurrent
    /// requests from the same caller never see each other's replies.
    pub async fn request(&self, mut message: Message, wait: Duration) -> Result<Message, BusError> {
        let reply_id = format!(
            "{}#{}",
            message.sender,
            self.inner.next_reply_id.fetch_add(1, Ordering::Relaxed)
        );
        self.register_agent(&reply_id, None);
        message.sender = reply_id.clone();

        let recipient = message.recipient.clone();
        let result = if self.send_message(message) {
            self.receive(&reply_id, wait).await
        } else {
            Err(BusError::UnknownRecipient(recipient))
        };

        self.unregister_agent(&reply_id);
        result
    }

    fn mailbox(&self, agent_id: &str) -> Option<Arc<Mailbox>> {
        self.inner
            .mailboxes
            .get(agent_id)
            .map(|mailbox| Arc::clone(mailbox.value()))
    }

    /// One polling pass: hand at most one queued message per handled mailbox
    /// to its handler. Returns how many deliveries were started.
    pub async fn poll_once(&self) -> usize {
        let handled: Vec<(String, Arc<Mailbox>)> = self
            .inner
            .mailboxes
            .iter()
            .filter(|entry| entry.value().handler.is_some())
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut delivered = 0;
        for (agent_id, mailbox) in handled {
            let message = match mailbox.receiver.try_lock() {
                Ok(mut receiver) => receiver.try_recv().ok(),
                Err(_) => None,
            };
            if let (Some(message), Some(handler)) = (message, mailbox.handler.clone()) {
                self.deliver(agent_id, handler, message);
                delivered += 1;
            }
        }
        delivered
    }

    fn deliver(&self, agent_id: String, handler: Arc<dyn MessageHandler>, message: Message) {
        let bus = self.clone();
        let message_id = message.message_id.clone();
        let task = tokio::spawn(async move { handler.handle(message, &bus).await });

        tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(agent_id = %agent_id, message_id = %message_id, error = %e, "Message handler failed");
                }
                Err(e) => {
                    tracing::error!(agent_id = %agent_id, message_id = %message_id, error = %e, "Message handler panicked");
                }
            }
        });
    }

    /// Start the background polling loop. Calling it again while running is a no-op.
    pub fn start_processing(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let bus = self.clone();
        let handle = tokio::spawn(async move {
            tracing::info!("Message bus processing started");
            while bus.inner.running.load(Ordering::SeqCst) {
                if bus.poll_once().await == 0 {
                    tokio::time::sleep(bus.inner.poll_interval).await;
                }
            }
            tracing::info!("Message bus processing stopped");
        });

        if let Ok(mut worker) = self.inner.worker.lock() {
            *worker = Some(handle);
        }
    }

    /// Ask the polling loop to stop after its current pass.
    pub fn stop_processing(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stop processing and wait for the polling loop to exit.
    pub async fn shutdown(&self) {
        self.stop_processing();
        let handle = self.inner.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Message bus worker ended abnormally");
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
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    const WAIT: Duration = Duration::from_secs(2);

    /// Forwards every message it gets to the "sink" mailbox.
    struct Forwarder;

    #[async_trait]
    impl MessageHandler for Forwarder {
        async fn handle(&self, message: Message, bus: &MessageBus) -> Result<(), BusError> {
            let forwarded = Message::new("forwarder", "sink", message.message_type, message.data);
            if bus.send_message(forwarded) {
                Ok(())
            } else {
                Err(BusError::UnknownRecipient("sink".to_string()))
            }
        }
    }

    struct Panicker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for Panicker {
        async fn handle(&self, _message: Message, _bus: &MessageBus) -> Result<(), BusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("handler blew up");
        }
    }

    fn bus() -> MessageBus {
        MessageBus::new(Duration::from_millis(5))
    }

    #[test]
    fn message_ids_name_both_ends() {
        let message = Message::new("api", "classifier_agent", "classify_text", json!({}));
        assert!(message.message_id.starts_with("api_classifier_agent_"));
        assert_eq!(message.priority, Priority::Low);
    }

    #[tokio::test]
    async fn send_to_unknown_recipient_fails() {
        let bus = bus();
        assert!(!bus.send_message(Message::new("a", "nobody", "ping", json!(null))));
    }

    #[tokio::test]
    async fn unhandled_mailboxes_are_pulled_manually() {
        let bus = bus();
        bus.register_agent("inbox", None);

        assert!(bus.send_message(Message::new("a", "inbox", "ping", json!(1))));
        assert_eq!(bus.poll_once().await, 0);

        let message = bus.try_receive("inbox").await.unwrap();
        assert_eq!(message.data, json!(1));
        assert!(bus.try_receive("inbox").await.is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber_once() {
        let bus = bus();
        bus.register_agent("one", None);
        bus.register_agent("two", None);
        bus.subscribe("one", "alert");
        bus.subscribe("two", "alert");
        bus.subscribe("two", "alert");

        assert!(!bus.broadcast("other", json!(null), "system", Priority::Low));
        assert!(bus.broadcast("alert", json!("fire"), "system", Priority::High));

        for agent in ["one", "two"] {
            let message = bus.try_receive(agent).await.unwrap();
            assert_eq!(message.recipient, agent);
            assert_eq!(message.priority, Priority::High);
            assert!(bus.try_receive(agent).await.is_none());
        }
    }

    #[tokio::test]
    async fn processing_loop_invokes_handlers() {
        let bus = bus();
        bus.register_agent("forwarder", Some(Arc::new(Forwarder)));
        bus.register_agent("sink", None);
        bus.start_processing();

        bus.send_message(Message::new("test", "forwarder", "ping", json!("hi")));
        let received = bus.receive("sink", WAIT).await.unwrap();

        assert_eq!(received.sender, "forwarder");
        assert_eq!(received.data, json!("hi"));
        bus.shutdown().await;
        assert!(!bus.is_running());
    }

    #[tokio::test]
    async fn panicking_handler_does_not_block_other_mailboxes() {
        let bus = bus();
        let panicker = Arc::new(Panicker {
            calls: AtomicUsize::new(0),
        });
        bus.register_agent("panicker", Some(panicker.clone()));
        bus.register_agent("forwarder", Some(Arc::new(Forwarder)));
        bus.register_agent("sink", None);
        bus.start_processing();

        bus.send_message(Message::new("test", "panicker", "boom", json!(null)));
        bus.send_message(Message::new("test", "panicker", "boom", json!(null)));
        bus.send_message(Message::new("test", "forwarder", "ping", json!(2)));

        let received = bus.receive("sink", WAIT).await.unwrap();
        assert_eq!(received.data, json!(2));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(panicker.calls.load(Ordering::SeqCst), 2);
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn request_waits_for_reply() {
        let bus = bus();
        bus.register_agent("echo", Some(Arc::new(Echo)));
        bus.start_processing();

        let reply = bus
            .request(Message::new("api", "echo", "ping", json!(42)), WAIT)
            .await
            .unwrap();
        assert_eq!(reply.data, json!(42));
        assert!(!bus.is_registered(&reply.recipient));

        assert!(matches!(
            bus.request(Message::new("api", "missing", "ping", json!(0)), WAIT)
                .await,
            Err(BusError::UnknownRecipient(_))
        ));
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn request_times_out_without_reply() {
        let bus = bus();
        bus.register_agent("silent", None);

        let result = bus
            .request(
                Message::new("api", "silent", "ping", json!(0)),
                Duration::from_millis(20),
            )
            .await;
        assert!(matches!(result, Err(BusError::Timeout(_))));
    }

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle(&self, message: Message, bus: &MessageBus) -> Result<(), BusError> {
            let reply = Message::new("echo", message.sender.clone(), "pong", message.data);
            bus.send_message(reply);
            Ok(())
        }
    }
}
