// Audit module - the append-only decision log, explanations and aggregate
// statistics for responsible-AI reporting.

pub mod audit_models;
pub mod audit_service;

pub use audit_models::*;
pub use audit_service::*;
