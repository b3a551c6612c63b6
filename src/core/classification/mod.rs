// Classification module - maps raw text onto the fixed policy categories.

pub mod classification_models;
pub mod classifier_service;

pub use classification_models::*;
pub use classifier_service::*;
