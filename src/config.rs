// Application configuration, read from the environment (after `.env`).
// Every field has a default, so loading never fails.

use crate::core::moderation::ModerationSettings;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Json,
    Sqlite,
    /// Nothing is written to disk; history lasts as long as the process.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StoreBackend::Json),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub store_backend: StoreBackend,
    pub audit_file: String,
    pub feedback_file: String,
    pub sqlite_file: String,

    /// Zero-shot classification endpoint. `None` means keyword fallback only.
    pub classifier_endpoint: Option<String>,
    pub classifier_api_token: Option<String>,
    pub classifier_timeout: Duration,

    pub similarity_threshold: f64,
    pub similar_cases_in_response: usize,
    pub max_content_chars: usize,

    pub message_bus_poll: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            data_dir: PathBuf::from(text("MODERATION_DATA_DIR", "data")),
            store_backend: parsed(&lookup, "MODERATION_STORE_BACKEND", StoreBackend::Json),
            audit_file: text("MODERATION_AUDIT_FILE", "audit_log.json"),
            feedback_file: text("MODERATION_FEEDBACK_FILE", "feedback_data.json"),
            sqlite_file: text("MODERATION_SQLITE_FILE", "moderation.db"),

            classifier_endpoint: optional("CLASSIFIER_ENDPOINT"),
            classifier_api_token: optional("CLASSIFIER_API_TOKEN"),
            classifier_timeout: Duration::from_millis(parsed(&lookup, "CLASSIFIER_TIMEOUT_MS", 5000)),

            similarity_threshold: parsed(&lookup, "SIMILARITY_THRESHOLD", 0.6),
            similar_cases_in_response: parsed(&lookup, "SIMILAR_CASES_IN_RESPONSE", 3),
            max_content_chars: parsed(&lookup, "MAX_CONTENT_CHARS", 10_000),

            message_bus_poll: Duration::from_millis(parsed(&lookup, "MESSAGE_BUS_POLL_MS", 100)),
        }
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join(&self.audit_file)
    }

    pub fn feedback_path(&self) -> PathBuf {
        self.data_dir.join(&self.feedback_file)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join(&self.sqlite_file)
    }

    /// How long an api caller waits on a bus round trip, which may include a
    /// full classifier call.
    pub fn bus_request_timeout(&self) -> Duration {
        self.classifier_timeout
            .saturating_add(self.message_bus_poll.saturating_mul(10))
    }

    pub fn moderation_settings(&self) -> ModerationSettings {
        ModerationSettings {
            similarity_threshold: self.similarity_threshold,
            similar_cases_in_response: self.similar_cases_in_response,
            max_content_chars: self.max_content_chars,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "Invalid config value, using default");
                default
            }
        },
        _ => default,
    }
}
