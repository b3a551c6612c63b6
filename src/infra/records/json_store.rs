use crate::core::records::{decode_records, HeldRows, RecordStore, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Record store backed by a single JSON array file.
///
/// Every save rewrites the whole file. The new contents go to a sibling temp
/// file first and are renamed over the old one, so a crash mid-write leaves
/// the previous history intact. Rows that fail to decode are carried over
/// verbatim on every save.
pub struct JsonRecordStore<T> {
    path: PathBuf,
    held: HeldRows,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonRecordStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: HeldRows::default(),
            _records: PhantomData,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl<T> RecordStore<T> for JsonRecordStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Vec<T>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = std::fs::read_to_string(&self.path)?;
        let rows: Vec<Box<RawValue>> = serde_json::from_str(&text)?;
        let (records, held) = decode_records(
            rows.iter().map(|row| row.get().to_string()),
            &self.path.display().to_string(),
        );
        self.held.replace(held);
        Ok(records)
    }

    async fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let encoded = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .held
            .interleave(encoded)
            .into_iter()
            .map(RawValue::from_string)
            .collect::<Result<Vec<_>, _>>()?;

        let temp = self.temp_path();
        let mut writer = BufWriter::new(File::create(&temp)?);
        serde_json::to_writer_pretty(&mut writer, &rows)?;
        writer.flush()?;
        drop(writer);

        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
