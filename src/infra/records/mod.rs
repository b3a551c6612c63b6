pub mod in_memory;
pub mod json_store;
pub mod sqlite_store;

pub use in_memory::InMemoryRecordStore;
pub use json_store::JsonRecordStore;
pub use sqlite_store::SqliteRecordStore;
