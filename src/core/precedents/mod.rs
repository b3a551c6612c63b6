// Precedents module - similarity search and trend aggregates computed on
// demand over the audit trail. Nothing here is persisted.

pub mod precedent_models;
pub mod precedent_service;

pub use precedent_models::*;
pub use precedent_service::*;
