// In-memory record store. Used by tests and by the `memory` storage backend,
// where history lives only as long as the process.

use crate::core::records::{RecordStore, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

pub struct InMemoryRecordStore<T> {
    records: RwLock<Vec<T>>,
    fail_writes: AtomicBool,
}

impl<T> InMemoryRecordStore<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start with pre-existing history, as if loaded from disk.
    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: RwLock::new(records),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent save fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl<T> Default for InMemoryRecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> RecordStore<T> for InMemoryRecordStore<T> {
    async fn load_all(&self) -> Result<Vec<T>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "writes disabled",
            )));
        }
        *self.records.write().await = records.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_replace_contents() {
        let store = InMemoryRecordStore::with_records(vec![1, 2]);
        assert_eq!(store.load_all().await.unwrap(), vec![1, 2]);

        store.save_all(&[3]).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn failing_writes_leave_contents_untouched() {
        let store = InMemoryRecordStore::with_records(vec!["a".to_string()]);
        store.fail_writes(true);

        assert!(store.save_all(&["b".to_string()]).await.is_err());
        assert_eq!(store.load_all().await.unwrap(), vec!["a".to_string()]);
    }
}
