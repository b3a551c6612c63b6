// The infra module contains implementations of core traits.
// Each adapter family goes in its own submodule.

#[path = "records/mod.rs"]
pub mod records;

#[path = "classification/mod.rs"]
pub mod classification;
