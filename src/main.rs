// This is the entry point of the moderation service.
//
// **Architecture Overview:**
// - `core/` = Business logic (pipeline stages, ports)
// - `infra/` = Implementations of core traits (record stores, HTTP classifier)
// - `api/` = Request/response adapter (one JSON request -> one JSON response)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Start the message bus
// 4. Serve newline-delimited JSON requests on stdin until EOF

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "api/api_layer.rs"]
mod api;
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::api::Dispatcher;
use crate::config::{AppConfig, StoreBackend};
use crate::core::audit::{AuditEntry, AuditTrail};
use crate::core::classification::{CategoryClassifier, ClassificationProvider};
use crate::core::feedback::{FeedbackLoop, FeedbackRecord};
use crate::core::messaging::{ClassificationAgent, MessageBus};
use crate::core::moderation::ModerationService;
use crate::core::records::RecordStore;
use crate::infra::classification::HuggingFaceZeroShotClient;
use crate::infra::records::{InMemoryRecordStore, JsonRecordStore, SqliteRecordStore};
use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

type AuditStore = Box<dyn RecordStore<AuditEntry>>;
type FeedbackStore = Box<dyn RecordStore<FeedbackRecord>>;

async fn build_stores(config: &AppConfig) -> anyhow::Result<(AuditStore, FeedbackStore)> {
    match config.store_backend {
        StoreBackend::Json => {
            tracing::info!(
                audit = %config.audit_path().display(),
                feedback = %config.feedback_path().display(),
                "Using JSON record stores"
            );
            let audit: AuditStore =
                Box::new(JsonRecordStore::<AuditEntry>::new(config.audit_path()));
            let feedback: FeedbackStore =
                Box::new(JsonRecordStore::<FeedbackRecord>::new(config.feedback_path()));
            Ok((audit, feedback))
        }
        StoreBackend::Sqlite => {
            let url = config.sqlite_path().to_string_lossy().to_string();
            tracing::info!(database = %url, "Using SQLite record stores");
            let audit: AuditStore = Box::new(
                SqliteRecordStore::<AuditEntry>::new(&url, "audit_log")
                    .await
                    .context("Failed to open audit table")?,
            );
            let feedback: FeedbackStore = Box::new(
                SqliteRecordStore::<FeedbackRecord>::new(&url, "feedback")
                    .await
                    .context("Failed to open feedback table")?,
            );
            Ok((audit, feedback))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record stores; history is lost on exit");
            let audit: AuditStore = Box::new(InMemoryRecordStore::<AuditEntry>::new());
            let feedback: FeedbackStore = Box::new(InMemoryRecordStore::<FeedbackRecord>::new());
            Ok((audit, feedback))
        }
    }
}

fn build_classifier(config: &AppConfig) -> CategoryClassifier {
    let provider: Option<Box<dyn ClassificationProvider>> =
        config.classifier_endpoint.as_ref().map(|endpoint| {
            tracing::info!(endpoint = %endpoint, "Using external classification service");
            Box::new(HuggingFaceZeroShotClient::new(
                endpoint.clone(),
                config.classifier_api_token.clone(),
            )) as Box<dyn ClassificationProvider>
        });

    let classifier = CategoryClassifier::new(provider, config.classifier_timeout);
    if !classifier.has_provider() {
        tracing::info!("No classification service configured, using keyword classification");
    }
    classifier
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Logs go to stderr; stdout carries responses only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let (audit_store, feedback_store) = build_stores(&config).await?;
    let audit = Arc::new(AuditTrail::load(audit_store).await);
    let feedback = Arc::new(FeedbackLoop::load(feedback_store).await);

    let classifier = Arc::new(build_classifier(&config));
    let moderation = Arc::new(ModerationService::new(
        Arc::clone(&classifier),
        Arc::clone(&audit),
        config.moderation_settings(),
    ));

    let bus = MessageBus::new(config.message_bus_poll);
    ClassificationAgent::new(Arc::clone(&classifier)).register(&bus);
    bus.start_processing();

    let dispatcher = Arc::new(Dispatcher::new(
        moderation,
        Arc::clone(&feedback),
        bus.clone(),
        config.bus_request_timeout(),
    ));

    // ========================================================================
    // REQUEST LOOP
    // ========================================================================

    tracing::info!("Ready, reading requests from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = Arc::clone(&dispatcher).handle_line_isolated(line).await;
        stdout
            .write_all(format!("{}\n", response).as_bytes())
            .await
            .context("Failed to write response")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }

    // ========================================================================
    // SHUTDOWN
    // ========================================================================

    tracing::info!("Input closed, shutting down");
    bus.shutdown().await;

    if let Err(e) = audit.flush().await {
        tracing::error!(error = %e, "Failed to flush audit log");
    }
    if let Err(e) = feedback.flush().await {
        tracing::error!(error = %e, "Failed to flush feedback log");
    }

    Ok(())
}
