// Records module - the append-only record store port shared by the audit
// trail and the feedback loop.

pub mod content_hash;
pub mod record_store;

pub use content_hash::content_hash;
pub use record_store::{decode_records, HeldRows, RecordStore, StoreError};
