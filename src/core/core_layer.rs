// The core module contains all business logic.
// Each pipeline stage gets its own submodule; storage and the external
// classifier are reached only through the ports defined here.

#[path = "classification/mod.rs"]
pub mod classification;

#[path = "risk/risk_service.rs"]
pub mod risk;

#[path = "actions/action_service.rs"]
pub mod actions;

#[path = "records/mod.rs"]
pub mod records;

#[path = "audit/mod.rs"]
pub mod audit;

#[path = "precedents/mod.rs"]
pub mod precedents;

#[path = "feedback/mod.rs"]
pub mod feedback;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "messaging/mod.rs"]
pub mod messaging;
