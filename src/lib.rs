pub mod config;
pub mod db;
pub mod errors;
pub mod journal;
pub mod models;
pub mod reminder;
pub mod settings;

use crate::config::JournalConfig;
use crate::errors::{AppError, AppResult};
use crate::journal::Journal;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Startup sequence: data directory, logging, then the note store. The
/// returned journal is only available once the schema is current.
pub async fn open_journal(config: &JournalConfig) -> AppResult<Journal> {
    std::fs::create_dir_all(&config.data_dir)?;
    if config.log_to_file {
        init_tracing(&config.data_dir)?;
    }

    Journal::open(config.database_path(), config.schema_options())
        .await
        .inspect_err(|error| tracing::error!(error = %error, "note store initialization failed"))
}

pub fn init_tracing(data_dir: &Path) -> AppResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "journal.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))?;
    let _ = LOG_GUARD.set(guard);
    Ok(())
}
