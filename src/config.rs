use crate::db::schema::SchemaOptions;
use crate::errors::{AppError, AppResult};
use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "PENGUINS_DIARY_DATA_DIR";
pub const SEED_ENV: &str = "PENGUINS_DIARY_SEED";
pub const FILE_LOG_ENV: &str = "PENGUINS_DIARY_FILE_LOG";

const DEFAULT_DATABASE_FILE: &str = "penguins-diary.db";
const DEFAULT_SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub settings_file: String,
    pub seed_starter_notes: bool,
    pub log_to_file: bool,
}

impl JournalConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            settings_file: DEFAULT_SETTINGS_FILE.to_string(),
            seed_starter_notes: true,
            log_to_file: true,
        }
    }

    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let data_dir = lookup(DATA_DIR_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput(format!("{} is not set", DATA_DIR_ENV)))?;

        let mut config = Self::new(data_dir);
        if let Some(raw) = lookup(SEED_ENV) {
            config.seed_starter_notes = parse_flag(SEED_ENV, &raw)?;
        }
        if let Some(raw) = lookup(FILE_LOG_ENV) {
            config.log_to_file = parse_flag(FILE_LOG_ENV, &raw)?;
        }
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.settings_file)
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            seed_starter_notes: self.seed_starter_notes,
        }
    }
}

fn parse_flag(key: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::InvalidInput(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
