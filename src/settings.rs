//! Device settings persistence. The host platform normally supplies its own
//! [`KeyValueStore`]; [`JsonFileStore`] covers desktop builds and tests.

use crate::errors::{AppError, AppResult};
use crate::models::ReminderSettings;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const NOTIFICATION_ENABLED_KEY: &str = "notification_enabled";
pub const NOTIFICATION_HOUR_KEY: &str = "notification_hour";
pub const NOTIFICATION_MINUTE_KEY: &str = "notification_minute";

pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> AppResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Flat string map persisted as one JSON object, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "settings file unreadable, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }
}

/// Missing or unparseable values fall back to the defaults.
pub fn load_reminder_settings(store: &impl KeyValueStore) -> AppResult<ReminderSettings> {
    let defaults = ReminderSettings::default();
    let enabled = store.get_item(NOTIFICATION_ENABLED_KEY)?;
    let hour = store.get_item(NOTIFICATION_HOUR_KEY)?;
    let minute = store.get_item(NOTIFICATION_MINUTE_KEY)?;

    Ok(ReminderSettings {
        enabled: enabled.as_deref() == Some("true"),
        hour: hour
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|hour| *hour < 24)
            .unwrap_or(defaults.hour),
        minute: minute
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|minute| *minute < 60)
            .unwrap_or(defaults.minute),
    })
}

pub fn save_reminder_settings(store: &impl KeyValueStore, settings: &ReminderSettings) -> AppResult<()> {
    store.set_item(NOTIFICATION_ENABLED_KEY, &settings.enabled.to_string())?;
    store.set_item(NOTIFICATION_HOUR_KEY, &settings.hour.to_string())?;
    store.set_item(NOTIFICATION_MINUTE_KEY, &settings.minute.to_string())?;
    Ok(())
}
