// Moderation module - the decision pipeline. Classification, risk scoring,
// action resolution, audit recording and precedent retrieval run here in
// that order for every submission.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
