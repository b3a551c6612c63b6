// Messaging module - the in-process message bus and the agents that listen
// on it. This is an alternative, decoupled way to reach the classifier; the
// moderation pipeline itself calls its stages directly.

pub mod classification_agent;
pub mod message_bus;

pub use classification_agent::*;
pub use message_bus::*;
