use crate::db::schema::SchemaOptions;
use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{CreateNotePayload, ListNotesFilters, Note, UpdateNotePayload};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;

/// Async handle over the note store. Each call runs on the blocking pool and
/// the connection serializes them, so callers simply await results in order.
#[derive(Debug, Clone)]
pub struct Journal {
    db: Arc<Database>,
}

impl Journal {
    /// Opens the database and brings its schema up to date before returning.
    pub async fn open(db_path: PathBuf, options: SchemaOptions) -> AppResult<Self> {
        let db = tokio::task::spawn_blocking(move || Database::with_options(&db_path, &options)).await??;
        Ok(Self::from_database(db))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn schema_version(&self) -> i64 {
        self.db.schema_version().get()
    }

    async fn run<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> AppResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || operation(&db)).await?
    }

    pub async fn list_notes(&self, filters: ListNotesFilters) -> AppResult<Vec<Note>> {
        self.run(move |db| db.list_notes(&filters)).await
    }

    pub async fn get_note(&self, note_id: i64) -> AppResult<Option<Note>> {
        self.run(move |db| db.get_note(note_id)).await
    }

    pub async fn random_note(&self) -> AppResult<Option<Note>> {
        self.run(|db| db.random_note()).await
    }

    /// Content for the daily reminder; `None` means there is nothing to schedule.
    pub async fn random_note_content(&self) -> AppResult<Option<String>> {
        Ok(self.random_note().await?.map(|note| note.content))
    }

    pub async fn create_note(&self, payload: CreateNotePayload) -> AppResult<Note> {
        self.run(move |db| db.create_note(&payload)).await
    }

    pub async fn update_note(&self, note_id: i64, payload: UpdateNotePayload) -> AppResult<Option<Note>> {
        self.run(move |db| db.update_note(note_id, &payload)).await
    }

    pub async fn delete_note(&self, note_id: i64) -> AppResult<bool> {
        self.run(move |db| db.delete_note(note_id)).await
    }

    pub async fn reorder_notes(&self, note_ids: Vec<i64>) -> AppResult<()> {
        self.run(move |db| db.reorder_notes(&note_ids)).await
    }

    pub async fn note_dates(&self) -> AppResult<Vec<NaiveDate>> {
        self.run(|db| db.note_dates()).await
    }

    pub async fn count_notes(&self) -> AppResult<u64> {
        self.run(|db| db.count_notes()).await
    }
}
