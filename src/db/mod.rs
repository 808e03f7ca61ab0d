pub mod schema;

use crate::errors::{AppError, AppResult};
use crate::models::{CreateNotePayload, ListNotesFilters, Note, UpdateNotePayload};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use rand::Rng;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params};
use schema::{SchemaOptions, SchemaVersion};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const NOTE_COLUMNS: &str = "id, content, date, image_uri, sort_order, created_at, updated_at";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    schema_version: SchemaVersion,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        Self::with_options(path, &SchemaOptions::default())
    }

    pub fn with_options(path: &Path, options: &SchemaOptions) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let mut conn = Connection::open(path).map_err(AppError::from)?;
        let schema_version = schema::initialize(&mut conn, options)?;
        Ok(Self::from_initialized(conn, path, schema_version))
    }

    fn from_initialized(conn: Connection, path: &Path, schema_version: SchemaVersion) -> Self {
        Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
            schema_version,
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    /// Lists notes. A date range wins over a search query; with neither, notes
    /// come back in manual `sort_order`.
    pub fn list_notes(&self, filters: &ListNotesFilters) -> AppResult<Vec<Note>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;

        if let Some(range) = filters.date_range {
            return query_notes(
                &conn,
                &format!(
                    "SELECT {NOTE_COLUMNS} FROM notes
                     WHERE date IS NOT NULL AND date >= ?1 AND date <= ?2
                     ORDER BY date DESC, created_at DESC, id DESC"
                ),
                params![range.from, range.to],
            );
        }

        let search = filters
            .search
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty());
        if let Some(search) = search {
            return query_notes(
                &conn,
                &format!(
                    "SELECT {NOTE_COLUMNS} FROM notes
                     WHERE content LIKE ?1 ESCAPE '\\'
                     ORDER BY CASE WHEN date IS NULL THEN 1 ELSE 0 END, date DESC, created_at DESC, id DESC"
                ),
                [format!("%{}%", escape_like(search))],
            );
        }

        if filters.include_unknown_dates == Some(false) {
            return query_notes(
                &conn,
                &format!(
                    "SELECT {NOTE_COLUMNS} FROM notes
                     WHERE date IS NOT NULL
                     ORDER BY date DESC, created_at DESC, id DESC"
                ),
                [],
            );
        }

        query_notes(
            &conn,
            &format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY sort_order ASC, id DESC"),
            [],
        )
    }

    pub fn get_note(&self, note_id: i64) -> AppResult<Option<Note>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        fetch_note(&conn, note_id)
    }

    pub fn random_note(&self) -> AppResult<Option<Note>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM notes", [], |row| row.get(0))?;
        if count == 0 {
            return Ok(None);
        }

        let offset = rand::rng().random_range(0..count);
        conn.query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY id ASC LIMIT 1 OFFSET ?1"),
            [offset],
            parse_note_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Inserts the note at the top of the manual order. The bump of every
    /// existing `sort_order` and the insert commit together.
    pub fn create_note(&self, payload: &CreateNotePayload) -> AppResult<Note> {
        let content = normalize_content(&payload.content)?;
        let now = now_timestamp();

        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;
        tx.execute("UPDATE notes SET sort_order = sort_order + 1", [])?;
        tx.execute(
            "INSERT INTO notes (content, date, image_uri, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![content, payload.date, payload.image_uri, format_timestamp(now)],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(note_id = id, dated = payload.date.is_some(), "created note");
        Ok(Note {
            id,
            content,
            date: payload.date,
            image_uri: payload.image_uri.clone(),
            sort_order: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_note(&self, note_id: i64, payload: &UpdateNotePayload) -> AppResult<Option<Note>> {
        let content = payload.content.as_deref().map(normalize_content).transpose()?;

        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        if payload.is_empty() {
            return fetch_note(&conn, note_id);
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(content) = content {
            assignments.push("content = ?");
            values.push(Value::Text(content));
        }
        if let Some(date) = payload.date {
            assignments.push("date = ?");
            values.push(date.map_or(Value::Null, |date| Value::Text(format_date(date))));
        }
        if let Some(image_uri) = &payload.image_uri {
            assignments.push("image_uri = ?");
            values.push(image_uri.clone().map_or(Value::Null, Value::Text));
        }
        assignments.push("updated_at = ?");
        values.push(Value::Text(format_timestamp(now_timestamp())));
        values.push(Value::Integer(note_id));

        let query = format!("UPDATE notes SET {} WHERE id = ?", assignments.join(", "));
        let changed = conn.execute(&query, params_from_iter(values))?;
        if changed == 0 {
            return Ok(None);
        }

        debug!(note_id, fields = assignments.len() - 1, "updated note");
        fetch_note(&conn, note_id)
    }

    /// Returns whether a note was removed; a missing id is not an error.
    pub fn delete_note(&self, note_id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let deleted = conn.execute("DELETE FROM notes WHERE id = ?1", [note_id])?;
        if deleted > 0 {
            debug!(note_id, "deleted note");
        }
        Ok(deleted > 0)
    }

    /// Assigns `sort_order` 0, 1, 2, ... following `note_ids`. The list must
    /// name every stored note exactly once; anything else is rejected and the
    /// existing order is kept.
    pub fn reorder_notes(&self, note_ids: &[i64]) -> AppResult<()> {
        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;

        let existing = {
            let mut stmt = tx.prepare("SELECT id FROM notes")?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            rows.collect::<Result<HashSet<_>, _>>()?
        };
        let requested: HashSet<i64> = note_ids.iter().copied().collect();
        if requested.len() != note_ids.len() {
            return Err(AppError::InvalidInput(
                "reorder list contains duplicate note ids".to_string(),
            ));
        }
        if requested != existing {
            return Err(AppError::InvalidInput(format!(
                "reorder list must contain every note exactly once (expected {}, got {})",
                existing.len(),
                note_ids.len()
            )));
        }

        {
            let mut stmt = tx.prepare("UPDATE notes SET sort_order = ?1 WHERE id = ?2")?;
            for (position, note_id) in note_ids.iter().enumerate() {
                stmt.execute(params![position as i64, note_id])?;
            }
        }
        tx.commit()?;

        debug!(count = note_ids.len(), "reordered notes");
        Ok(())
    }

    /// Distinct known dates, newest first.
    pub fn note_dates(&self) -> AppResult<Vec<NaiveDate>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT date FROM notes WHERE date IS NOT NULL ORDER BY date DESC",
        )?;
        let dates = stmt
            .query_map([], |row| row.get::<_, NaiveDate>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dates)
    }

    pub fn count_notes(&self) -> AppResult<u64> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM notes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn query_notes<P: Params>(conn: &Connection, query: &str, params: P) -> AppResult<Vec<Note>> {
    let mut stmt = conn.prepare(query)?;
    let notes = stmt
        .query_map(params, parse_note_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notes)
}

fn fetch_note(conn: &Connection, note_id: i64) -> AppResult<Option<Note>> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
        [note_id],
        parse_note_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn parse_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        content: row.get(1)?,
        date: row.get(2)?,
        image_uri: row.get(3)?,
        sort_order: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        updated_at: parse_time(&row.get::<_, String>(6)?)?,
    })
}

fn normalize_content(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("note content must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn now_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

pub(crate) fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts the crate's own format, SQLite's `CURRENT_TIMESTAMP` output and
/// RFC 3339.
fn parse_time(raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc).naive_utc()))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> AppResult<bool> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::schema::{SchemaOptions, CURRENT_VERSION};
    use super::{parse_time, Database};
    use crate::errors::AppError;
    use crate::models::{CreateNotePayload, ListNotesFilters, UpdateNotePayload};
    use chrono::NaiveDate;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn empty_db(dir: &tempfile::TempDir) -> Database {
        Database::with_options(
            &dir.path().join("test.db"),
            &SchemaOptions {
                seed_starter_notes: false,
            },
        )
        .expect("db")
    }

    fn contents(db: &Database, filters: &ListNotesFilters) -> Vec<String> {
        db.list_notes(filters)
            .expect("list notes")
            .into_iter()
            .map(|note| note.content)
            .collect()
    }

    #[test]
    fn database_can_create_and_read_note() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);

        let created = db
            .create_note(&CreateNotePayload::new("X").with_date(date("2024-01-01")))
            .expect("create note");
        let loaded = db.get_note(created.id).expect("get note").expect("note exists");

        assert_eq!(loaded.content, "X");
        assert_eq!(loaded.date, Some(date("2024-01-01")));
        assert_eq!(loaded.created_at, loaded.updated_at);
        assert_eq!(loaded, created);
        assert_eq!(db.schema_version().get(), CURRENT_VERSION);
    }

    #[test]
    fn create_trims_content_and_rejects_blank() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);

        let note = db
            .create_note(&CreateNotePayload::new("  sunshine \n"))
            .expect("create note");
        assert_eq!(note.content, "sunshine");

        let error = db
            .create_note(&CreateNotePayload::new("   "))
            .expect_err("blank content");
        assert!(matches!(error, AppError::InvalidInput(_)));
        assert_eq!(db.count_notes().expect("count"), 1);
    }

    #[test]
    fn creates_keep_sort_order_dense_and_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);

        let mut ids = Vec::new();
        for index in 0..5 {
            ids.push(db.create_note(&CreateNotePayload::new(format!("note {index}"))).expect("create").id);
        }

        let notes = db.list_notes(&ListNotesFilters::default()).expect("list");
        let orders: Vec<i64> = notes.iter().map(|note| note.sort_order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);
        let listed_ids: Vec<i64> = notes.iter().map(|note| note.id).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids);
    }

    #[test]
    fn create_delete_reorder_scenario() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);

        let a = db.create_note(&CreateNotePayload::new("A")).expect("create A");
        let b = db.create_note(&CreateNotePayload::new("B")).expect("create B");
        let c = db.create_note(&CreateNotePayload::new("C")).expect("create C");

        let order = |db: &Database| -> Vec<(String, i64)> {
            db.list_notes(&ListNotesFilters::default())
                .expect("list")
                .into_iter()
                .map(|note| (note.content, note.sort_order))
                .collect()
        };
        assert_eq!(
            order(&db),
            vec![("C".to_string(), 0), ("B".to_string(), 1), ("A".to_string(), 2)]
        );

        assert!(db.delete_note(b.id).expect("delete B"));
        assert_eq!(order(&db), vec![("C".to_string(), 0), ("A".to_string(), 2)]);

        db.reorder_notes(&[a.id, c.id]).expect("reorder");
        assert_eq!(order(&db), vec![("A".to_string(), 0), ("C".to_string(), 1)]);
    }

    #[test]
    fn reorder_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        let ids: Vec<i64> = (0..4)
            .map(|index| db.create_note(&CreateNotePayload::new(format!("n{index}"))).expect("create").id)
            .collect();
        let desired = vec![ids[2], ids[0], ids[3], ids[1]];

        db.reorder_notes(&desired).expect("first reorder");
        let first = db.list_notes(&ListNotesFilters::default()).expect("list");
        db.reorder_notes(&desired).expect("second reorder");
        let second = db.list_notes(&ListNotesFilters::default()).expect("list");

        assert_eq!(first, second);
        assert_eq!(first.iter().map(|note| note.id).collect::<Vec<_>>(), desired);
    }

    #[test]
    fn reorder_rejects_partial_duplicate_and_unknown_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        let a = db.create_note(&CreateNotePayload::new("A")).expect("create").id;
        let b = db.create_note(&CreateNotePayload::new("B")).expect("create").id;
        let before = db.list_notes(&ListNotesFilters::default()).expect("list");

        for ids in [vec![a], vec![a, a], vec![a, b, b], vec![a, b + 100]] {
            let error = db.reorder_notes(&ids).expect_err("invalid reorder");
            assert!(matches!(error, AppError::InvalidInput(_)));
        }
        assert_eq!(db.list_notes(&ListNotesFilters::default()).expect("list"), before);
    }

    fn sort_orders(db: &Database) -> Vec<(i64, i64)> {
        db.list_notes(&ListNotesFilters::default())
            .expect("list")
            .into_iter()
            .map(|note| (note.id, note.sort_order))
            .collect()
    }

    #[test]
    fn failed_insert_rolls_back_sort_order_bump() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        db.create_note(&CreateNotePayload::new("A")).expect("create A");
        db.create_note(&CreateNotePayload::new("B")).expect("create B");
        let before = sort_orders(&db);

        {
            let conn = db.conn.lock().expect("db lock");
            conn.execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON notes
                 WHEN NEW.content = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
            )
            .expect("create trigger");
        }

        let error = db
            .create_note(&CreateNotePayload::new("boom"))
            .expect_err("insert aborted");
        assert!(matches!(error, AppError::Storage(_)));
        assert_eq!(sort_orders(&db), before);
        assert_eq!(db.count_notes().expect("count"), 2);
    }

    #[test]
    fn failed_reorder_step_keeps_previous_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        let a = db.create_note(&CreateNotePayload::new("A")).expect("create A").id;
        let b = db.create_note(&CreateNotePayload::new("B")).expect("create B").id;
        let c = db.create_note(&CreateNotePayload::new("C")).expect("create C").id;
        let before = sort_orders(&db);

        {
            let conn = db.conn.lock().expect("db lock");
            conn.execute_batch(
                "CREATE TRIGGER reject_second_slot BEFORE UPDATE OF sort_order ON notes
                 WHEN NEW.sort_order = 1
                 BEGIN SELECT RAISE(ABORT, 'slot 1 locked'); END;",
            )
            .expect("create trigger");
        }

        let error = db.reorder_notes(&[a, b, c]).expect_err("second update aborted");
        assert!(matches!(error, AppError::Storage(_)));
        assert_eq!(sort_orders(&db), before);
    }

    #[test]
    fn update_clearing_date_leaves_other_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        let created = db
            .create_note(
                &CreateNotePayload::new("garden")
                    .with_date(date("2024-05-01"))
                    .with_image_uri("file:///garden.jpg"),
            )
            .expect("create");

        let updated = db
            .update_note(
                created.id,
                &UpdateNotePayload {
                    date: Some(None),
                    ..UpdateNotePayload::default()
                },
            )
            .expect("update")
            .expect("note exists");

        assert_eq!(updated.date, None);
        assert_eq!(updated.content, "garden");
        assert_eq!(updated.image_uri.as_deref(), Some("file:///garden.jpg"));
        assert_eq!(updated.sort_order, created.sort_order);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn update_sets_content_and_image_independently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        let created = db
            .create_note(&CreateNotePayload::new("first").with_image_uri("file:///a.png"))
            .expect("create");

        let updated = db
            .update_note(
                created.id,
                &UpdateNotePayload {
                    content: Some("  second ".to_string()),
                    image_uri: Some(None),
                    ..UpdateNotePayload::default()
                },
            )
            .expect("update")
            .expect("note exists");
        assert_eq!(updated.content, "second");
        assert_eq!(updated.image_uri, None);

        let error = db
            .update_note(
                created.id,
                &UpdateNotePayload {
                    content: Some(" ".to_string()),
                    ..UpdateNotePayload::default()
                },
            )
            .expect_err("blank content");
        assert!(matches!(error, AppError::InvalidInput(_)));
    }

    #[test]
    fn empty_update_and_missing_ids_are_not_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        let created = db.create_note(&CreateNotePayload::new("steady")).expect("create");

        let unchanged = db
            .update_note(created.id, &UpdateNotePayload::default())
            .expect("noop update")
            .expect("note exists");
        assert_eq!(unchanged, created);

        let missing = db
            .update_note(
                created.id + 1,
                &UpdateNotePayload {
                    content: Some("ghost".to_string()),
                    ..UpdateNotePayload::default()
                },
            )
            .expect("update missing");
        assert!(missing.is_none());
        assert!(db.get_note(created.id + 1).expect("get missing").is_none());
        assert!(!db.delete_note(created.id + 1).expect("delete missing"));
        assert_eq!(db.count_notes().expect("count"), 1);
    }

    #[test]
    fn search_places_unknown_dates_last() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        db.create_note(&CreateNotePayload::new("grateful for coffee"))
            .expect("create");
        db.create_note(&CreateNotePayload::new("Grateful for rain").with_date(date("2024-01-02")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("not matching").with_date(date("2024-01-03")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("grateful for friends").with_date(date("2024-03-01")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("grateful for sleep"))
            .expect("create");

        assert_eq!(
            contents(&db, &ListNotesFilters::search("  grateful ")),
            vec![
                "grateful for friends",
                "Grateful for rain",
                "grateful for sleep",
                "grateful for coffee",
            ]
        );
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        db.create_note(&CreateNotePayload::new("100% happy")).expect("create");
        db.create_note(&CreateNotePayload::new("1000 happy")).expect("create");
        db.create_note(&CreateNotePayload::new("snake_case")).expect("create");

        assert_eq!(contents(&db, &ListNotesFilters::search("0%")), vec!["100% happy"]);
        assert_eq!(contents(&db, &ListNotesFilters::search("e_c")), vec!["snake_case"]);
    }

    #[test]
    fn blank_search_falls_back_to_manual_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        db.create_note(&CreateNotePayload::new("one").with_date(date("2024-01-01")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("two")).expect("create");

        assert_eq!(contents(&db, &ListNotesFilters::search("   ")), vec!["two", "one"]);
    }

    #[test]
    fn date_range_is_inclusive_and_excludes_unknown_dates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        db.create_note(&CreateNotePayload::new("before").with_date(date("2023-12-31")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("start").with_date(date("2024-01-01")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("undated")).expect("create");
        db.create_note(&CreateNotePayload::new("end").with_date(date("2024-01-31")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("start again").with_date(date("2024-01-01")))
            .expect("create");

        let filters = ListNotesFilters::date_range(date("2024-01-01"), date("2024-01-31"));
        assert_eq!(contents(&db, &filters), vec!["end", "start again", "start"]);
        assert!(db
            .list_notes(&filters)
            .expect("list")
            .iter()
            .all(|note| note.date.is_some()));

        let inverted = ListNotesFilters::date_range(date("2024-02-01"), date("2024-01-01"));
        assert!(db.list_notes(&inverted).expect("list").is_empty());
    }

    #[test]
    fn date_range_takes_precedence_over_search() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        db.create_note(&CreateNotePayload::new("apple").with_date(date("2024-01-01")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("banana").with_date(date("2024-06-01")))
            .expect("create");

        let filters = ListNotesFilters {
            search: Some("banana".to_string()),
            ..ListNotesFilters::date_range(date("2024-01-01"), date("2024-01-31"))
        };
        assert_eq!(contents(&db, &filters), vec!["apple"]);
    }

    #[test]
    fn dated_only_listing_orders_by_date() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        db.create_note(&CreateNotePayload::new("old").with_date(date("2022-01-01")))
            .expect("create");
        db.create_note(&CreateNotePayload::new("undated")).expect("create");
        db.create_note(&CreateNotePayload::new("new").with_date(date("2024-01-01")))
            .expect("create");

        let filters = ListNotesFilters {
            include_unknown_dates: Some(false),
            ..ListNotesFilters::default()
        };
        assert_eq!(contents(&db, &filters), vec!["new", "old"]);
    }

    #[test]
    fn random_note_handles_empty_and_populated_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        assert!(db.random_note().expect("random on empty").is_none());

        let only = db.create_note(&CreateNotePayload::new("only")).expect("create");
        for _ in 0..5 {
            assert_eq!(db.random_note().expect("random").expect("some note").id, only.id);
        }

        db.create_note(&CreateNotePayload::new("second")).expect("create");
        let picked = db.random_note().expect("random").expect("some note");
        assert!(picked.content == "only" || picked.content == "second");
    }

    #[test]
    fn note_dates_are_distinct_and_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        for raw in ["2024-01-01", "2024-03-01", "2024-01-01"] {
            db.create_note(&CreateNotePayload::new("dated").with_date(date(raw)))
                .expect("create");
        }
        db.create_note(&CreateNotePayload::new("undated")).expect("create");

        assert_eq!(
            db.note_dates().expect("dates"),
            vec![date("2024-03-01"), date("2024-01-01")]
        );
    }

    #[test]
    fn default_database_is_seeded_with_undated_notes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("seeded.db")).expect("db");

        let notes = db.list_notes(&ListNotesFilters::default()).expect("list");
        assert!(!notes.is_empty());
        assert!(notes.iter().all(|note| note.date.is_none()));

        let created = db.create_note(&CreateNotePayload::new("mine")).expect("create");
        let notes = db.list_notes(&ListNotesFilters::default()).expect("list");
        assert_eq!(notes[0].id, created.id);
        let orders: Vec<i64> = notes.iter().map(|note| note.sort_order).collect();
        assert_eq!(orders, (0..notes.len() as i64).collect::<Vec<_>>());
    }

    #[test]
    fn storage_failure_is_distinct_from_empty_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = empty_db(&dir);
        assert!(db.list_notes(&ListNotesFilters::search("none")).expect("list").is_empty());

        {
            let conn = db.conn.lock().expect("db lock");
            conn.execute("DROP TABLE notes", []).expect("drop notes");
        }

        let error = db
            .list_notes(&ListNotesFilters::default())
            .expect_err("missing table");
        assert!(matches!(error, AppError::Storage(_)));
    }

    #[test]
    fn parses_legacy_and_current_timestamps() {
        let legacy = parse_time("2023-01-01 08:00:00").expect("legacy");
        let current = parse_time("2023-01-01 08:00:00.250000").expect("current");
        let rfc = parse_time("2023-01-01T08:00:00+00:00").expect("rfc3339");
        assert_eq!(legacy, rfc);
        assert!(current > legacy);
    }
}
