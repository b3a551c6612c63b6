use crate::core::records::{decode_records, HeldRows, RecordStore, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::marker::PhantomData;
use std::path::Path;

/// Record store keeping one JSON document per row in a SQLite table.
///
/// Several stores may share a database file as long as each uses its own
/// table. A save replaces the table contents inside one transaction, writing
/// rows that failed to decode back unchanged.
pub struct SqliteRecordStore<T> {
    pool: Pool<Sqlite>,
    table: String,
    held: HeldRows,
    _records: PhantomData<fn() -> T>,
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn is_valid_table_name(table: &str) -> bool {
    let mut chars = table.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl<T> SqliteRecordStore<T> {
    pub async fn new(database_url: &str, table: &str) -> Result<Self, StoreError> {
        if !is_valid_table_name(table) {
            return Err(StoreError::Database(format!(
                "Invalid table name: {:?}",
                table
            )));
        }

        let in_memory = database_url.contains(":memory:");
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !in_memory && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        // Every pooled connection to :memory: would open its own empty database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&conn_str)
            .await
            .map_err(db_error)?;

        let store = Self {
            pool,
            table: table.to_string(),
            held: HeldRows::default(),
            _records: PhantomData,
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL
            );
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

#[async_trait]
impl<T> RecordStore<T> for SqliteRecordStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load_all(&self) -> Result<Vec<T>, StoreError> {
        let rows = sqlx::query(&format!("SELECT payload FROM {} ORDER BY id", self.table))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let payloads = rows.iter().map(|row| row.get::<String, _>("payload"));
        let (records, held) = decode_records(payloads, &self.table);
        self.held.replace(held);
        Ok(records)
    }

    async fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        let payloads = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let payloads = self.held.interleave(payloads);

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let insert = format!("INSERT INTO {} (payload) VALUES (?)", self.table);
        for payload in payloads {
            sqlx::query(&insert)
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}
