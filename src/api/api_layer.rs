// API layer - turns one JSON request into one JSON response.
// Transport (stdin/stdout in main, or anything else) stays outside.

#[path = "requests.rs"]
pub mod requests;

#[path = "dispatcher.rs"]
pub mod dispatcher;

pub use dispatcher::Dispatcher;
