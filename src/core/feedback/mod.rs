// Feedback module - human correctness verdicts against past decisions and the
// correction examples exported from them.

pub mod feedback_models;
pub mod feedback_service;

pub use feedback_models::*;
pub use feedback_service::*;
