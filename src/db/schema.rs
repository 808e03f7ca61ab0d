//! Versioned schema lifecycle for the note store.
//!
//! The on-disk version lives in `PRAGMA user_version`. [`initialize`] reads it
//! once, applies every pending [`Migration`] inside a single transaction and
//! stamps the new version last, so a failed launch leaves the store exactly as
//! it was before.

use super::{column_exists, format_timestamp, now_timestamp};
use crate::errors::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

pub const CURRENT_VERSION: i64 = 3;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const STARTER_NOTES: &[&str] = &[
    "A warm cup of tea on a cold morning.",
    "Friends who call just to check in.",
    "The smell of rain on dry pavement.",
    "A good book that kept me up past midnight.",
    "Sunlight coming through the kitchen window.",
    "Laughing until my stomach hurt.",
    "A quiet walk with nowhere to be.",
    "Clean sheets after a long day.",
    "Someone holding the door open for me.",
    "Having a place to call home.",
];

/// Proof that the schema has been brought up to date. Only [`initialize`] can
/// produce one, and the note store requires it at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion(i64);

impl SchemaVersion {
    pub fn get(self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaOptions {
    pub seed_starter_notes: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            seed_starter_notes: true,
        }
    }
}

struct Migration {
    version: i64,
    name: &'static str,
    apply: fn(&Connection, &SchemaOptions) -> AppResult<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        name: "nullable_note_date",
        apply: allow_unknown_dates,
    },
    Migration {
        version: 3,
        name: "manual_sort_order",
        apply: add_sort_order,
    },
];

pub fn initialize(conn: &mut Connection, options: &SchemaOptions) -> AppResult<SchemaVersion> {
    migrate(conn, options).map_err(|error| match error {
        AppError::Migration(message) => AppError::Migration(message),
        other => AppError::Migration(other.to_string()),
    })
}

pub fn read_version(conn: &Connection) -> AppResult<i64> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn migrate(conn: &mut Connection, options: &SchemaOptions) -> AppResult<SchemaVersion> {
    let current = read_version(conn)?;
    if current > CURRENT_VERSION {
        return Err(AppError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    let fresh = !table_exists(conn, "notes")?;
    if !fresh && current == CURRENT_VERSION {
        debug!(version = current, "note store schema is current");
        return Ok(SchemaVersion(current));
    }

    let tx = conn.transaction()?;
    if fresh {
        tx.execute_batch(SCHEMA_SQL)?;
        if options.seed_starter_notes {
            seed_starter_notes(&tx)?;
            backfill_sort_order(&tx)?;
        }
        tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
        tx.commit()?;
        info!(version = CURRENT_VERSION, "created note store");
        return Ok(SchemaVersion(CURRENT_VERSION));
    }

    for migration in MIGRATIONS.iter().filter(|migration| migration.version > current) {
        (migration.apply)(&tx, options)?;
        info!(
            from = current,
            to = migration.version,
            step = migration.name,
            "applied schema migration"
        );
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;

    Ok(SchemaVersion(CURRENT_VERSION))
}

/// v2: `date` becomes nullable so notes can have an unknown date. SQLite cannot
/// relax a NOT NULL constraint in place, so the table is rebuilt.
fn allow_unknown_dates(conn: &Connection, options: &SchemaOptions) -> AppResult<()> {
    if column_not_null(conn, "notes", "date")? {
        let last_id = autoincrement_seq(conn, "notes")?;
        conn.execute_batch(
            "DROP TABLE IF EXISTS notes_new;
             CREATE TABLE notes_new (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               content TEXT NOT NULL,
               date TEXT,
               image_uri TEXT,
               created_at TEXT DEFAULT CURRENT_TIMESTAMP,
               updated_at TEXT DEFAULT CURRENT_TIMESTAMP
             );
             INSERT INTO notes_new (id, content, date, image_uri, created_at, updated_at)
               SELECT id, content, date, image_uri, created_at, updated_at FROM notes;
             DROP TABLE notes;
             ALTER TABLE notes_new RENAME TO notes;",
        )?;
        if let Some(last_id) = last_id {
            restore_autoincrement_seq(conn, "notes", last_id)?;
        }
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_notes_date ON notes(date DESC);
         CREATE INDEX IF NOT EXISTS idx_notes_content ON notes(content);",
    )?;

    if options.seed_starter_notes {
        seed_starter_notes(conn)?;
    }
    Ok(())
}

/// v3: manual ordering. Existing notes are ranked newest first.
fn add_sort_order(conn: &Connection, _options: &SchemaOptions) -> AppResult<()> {
    if !column_exists(conn, "notes", "sort_order")? {
        conn.execute("ALTER TABLE notes ADD COLUMN sort_order INTEGER DEFAULT 0", [])?;
        backfill_sort_order(conn)?;
    }
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notes_sort_order ON notes(sort_order ASC)",
        [],
    )?;
    Ok(())
}

fn backfill_sort_order(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "UPDATE notes SET sort_order = (
           SELECT ranked.position FROM (
             SELECT id, ROW_NUMBER() OVER (ORDER BY created_at DESC, id DESC) - 1 AS position
             FROM notes
           ) AS ranked
           WHERE ranked.id = notes.id
         )",
        [],
    )?;
    Ok(())
}

/// Skipped whenever any unknown-date note exists, so repeated launches never
/// seed twice.
fn seed_starter_notes(conn: &Connection) -> AppResult<()> {
    let unknown_dated: i64 = conn.query_row(
        "SELECT COUNT(1) FROM notes WHERE date IS NULL",
        [],
        |row| row.get(0),
    )?;
    if unknown_dated > 0 {
        return Ok(());
    }

    let now = format_timestamp(now_timestamp());
    let mut stmt = conn.prepare(
        "INSERT INTO notes (content, date, image_uri, created_at, updated_at)
         VALUES (?1, NULL, NULL, ?2, ?2)",
    )?;
    for content in STARTER_NOTES {
        stmt.execute(params![content, now])?;
    }
    info!(count = STARTER_NOTES.len(), "seeded starter notes");
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Highest id ever handed out for `table`, including deleted rows.
fn autoincrement_seq(conn: &Connection, table: &str) -> AppResult<Option<i64>> {
    if !table_exists(conn, "sqlite_sequence")? {
        return Ok(None);
    }
    let seq = conn
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(seq)
}

/// Rebuilt tables restart their sequence at the highest surviving id; keep the
/// old high-water mark so deleted ids are never reused.
fn restore_autoincrement_seq(conn: &Connection, table: &str, last_id: i64) -> AppResult<()> {
    let updated = conn.execute(
        "UPDATE sqlite_sequence SET seq = MAX(seq, ?2) WHERE name = ?1",
        params![table, last_id],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            params![table, last_id],
        )?;
    }
    Ok(())
}

fn column_not_null(conn: &Connection, table: &str, column: &str) -> AppResult<bool> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            let not_null: i64 = row.get(3)?;
            return Ok(not_null != 0);
        }
    }
    Ok(false)
}
