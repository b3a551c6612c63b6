use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(String),
}

/// Tabular, append-only record store.
///
/// Reads the whole history once at startup and rewrites it in full on every
/// save. There are no partial or delta writes.
#[async_trait]
pub trait RecordStore<T: Send + Sync + 'static>: Send + Sync {
    /// Load every stored record, oldest first. An absent store is empty.
    async fn load_all(&self) -> Result<Vec<T>, StoreError>;

    /// Replace the stored contents with `records`.
    async fn save_all(&self, records: &[T]) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: Send + Sync + 'static> RecordStore<T> for Box<dyn RecordStore<T>> {
    async fn load_all(&self) -> Result<Vec<T>, StoreError> {
        (**self).load_all().await
    }

    async fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        (**self).save_all(records).await
    }
}

/// Rows that failed to decode at load time, kept verbatim at their original
/// position in the log.
///
/// The log is append-only, so the positions stay valid across later saves and
/// `interleave` puts every held row back where it was.
#[derive(Debug, Default)]
pub struct HeldRows {
    rows: Mutex<Vec<(usize, String)>>,
}

impl HeldRows {
    pub fn replace(&self, rows: Vec<(usize, String)>) {
        *self.rows.lock().unwrap_or_else(|e| e.into_inner()) = rows;
    }

    /// Merge encoded `records` with the held rows, restoring load-time order.
    pub fn interleave(&self, records: Vec<String>) -> Vec<String> {
        let held = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut held_iter = held.iter().peekable();
        let mut merged = Vec::with_capacity(records.len() + held.len());

        for record in records {
            while let Some((_, raw)) = held_iter.next_if(|(index, _)| *index <= merged.len()) {
                merged.push(raw.clone());
            }
            merged.push(record);
        }
        merged.extend(held_iter.map(|(_, raw)| raw.clone()));
        merged
    }
}

/// Decode raw JSON rows, setting aside the ones that no longer match the
/// record shape.
///
/// Rows are decoded straight from their text so map key order survives. A
/// malformed historical row is logged and returned with its index; it never
/// aborts the load.
pub fn decode_records<T, I>(rows: I, source: &str) -> (Vec<T>, Vec<(usize, String)>)
where
    T: DeserializeOwned,
    I: IntoIterator<Item = String>,
{
    let mut records = Vec::new();
    let mut held = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_str::<T>(&row) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(source, index, error = %e, "Keeping malformed record aside");
                held.push((index, row));
            }
        }
    }

    (records, held)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: u32,
    }

    fn raw(rows: &[&str]) -> Vec<String> {
        rows.iter().map(|row| row.to_string()).collect()
    }

    #[test]
    fn decode_sets_malformed_rows_aside() {
        let rows = raw(&[r#"{"id": 1}"#, r#"{"id": "two"}"#, r#"{"id": 3}"#]);
        let (decoded, held): (Vec<Row>, _) = decode_records(rows, "test");

        assert_eq!(decoded, vec![Row { id: 1 }, Row { id: 3 }]);
        assert_eq!(held, vec![(1, r#"{"id": "two"}"#.to_string())]);
    }

    #[test]
    fn held_rows_return_to_their_positions() {
        let held = HeldRows::default();
        held.replace(vec![(0, "bad-a".into()), (2, "bad-b".into())]);

        let merged = held.interleave(raw(&["one", "three", "four"]));
        assert_eq!(merged, raw(&["bad-a", "one", "bad-b", "three", "four"]));
    }

    #[test]
    fn held_rows_past_the_end_are_appended() {
        let held = HeldRows::default();
        held.replace(vec![(5, "bad".into())]);

        assert_eq!(held.interleave(raw(&["one"])), raw(&["one", "bad"]));
    }

    #[test]
    fn store_error_messages_are_descriptive() {
        let err = StoreError::Database("locked".into());
        assert_eq!(err.to_string(), "Database error: locked");
    }
}
