use crate::error::{Error, Result};
use crate::models::count::Count;
use crate::models::counter::Counter;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const DB_SCHEMA_VERSION: i64 = 2;

const COUNTER_COLUMNS: &str = "id, name, frequency, timezone, created_at";
const COUNT_COLUMNS: &str = "id, counter_id, value, expiry, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub schema_version: i64,
}

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("database schema v{version} is newer than this build (v{DB_SCHEMA_VERSION})");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS counters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            frequency TEXT NOT NULL DEFAULT '1d',
            timezone TEXT NOT NULL DEFAULT 'UTC',
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            counter_id INTEGER NOT NULL REFERENCES counters(id),
            value INTEGER NOT NULL DEFAULT 0 CHECK(value >= 0),
            expiry INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_counts_counter_id ON counts(counter_id, id);
        CREATE INDEX IF NOT EXISTS idx_counts_created_at ON counts(counter_id, created_at);
        ",
    )
}

/// Open (creating if needed) the database file and bring its schema up to date.
pub fn open_database(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    initialize_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    initialize_schema(&conn)?;
    Ok(conn)
}

pub fn health_check(conn: &Connection) -> Result<HealthReport> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    let schema_version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(HealthReport {
        status: "ok",
        schema_version,
    })
}

// Counter directory

pub fn insert_counter(
    conn: &Connection,
    name: &str,
    frequency: &str,
    timezone: &str,
    created_at: DateTime<Utc>,
) -> Result<Counter> {
    conn.execute(
        "INSERT INTO counters (name, frequency, timezone, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, frequency, timezone, created_at.timestamp_millis()],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::DuplicateName(name.to_string())
        }
        other => Error::from(other),
    })?;

    Ok(Counter {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        frequency: frequency.to_string(),
        timezone: timezone.to_string(),
        created_at: truncate_to_millis(created_at),
    })
}

pub fn load_counter(conn: &Connection, id: i64) -> Result<Option<Counter>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COUNTER_COLUMNS} FROM counters WHERE id = ?1"),
            params![id],
            counter_from_row,
        )
        .optional()?)
}

pub fn load_counter_by_name(conn: &Connection, name: &str) -> Result<Option<Counter>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COUNTER_COLUMNS} FROM counters WHERE name = ?1"),
            params![name],
            counter_from_row,
        )
        .optional()?)
}

pub fn load_counters(conn: &Connection) -> Result<Vec<Counter>> {
    let mut stmt = conn.prepare(&format!("SELECT {COUNTER_COLUMNS} FROM counters ORDER BY id"))?;
    let counters = stmt
        .query_map([], counter_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(counters)
}

/// Returns `false` when no counter has this id.
pub fn update_counter_frequency(conn: &Connection, id: i64, frequency: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE counters SET frequency = ?1 WHERE id = ?2",
        params![frequency, id],
    )?;
    Ok(changed > 0)
}

// Count store

pub fn insert_count(
    conn: &Connection,
    counter_id: i64,
    expiry: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> Result<Count> {
    conn.execute(
        "INSERT INTO counts (counter_id, value, expiry, created_at) VALUES (?1, 0, ?2, ?3)",
        params![counter_id, expiry.timestamp_millis(), created_at.timestamp_millis()],
    )?;

    Ok(Count {
        id: conn.last_insert_rowid(),
        counter_id,
        value: 0,
        expiry: truncate_to_millis(expiry),
        created_at: truncate_to_millis(created_at),
    })
}

pub fn update_count_value(conn: &Connection, count_id: i64, value: i64) -> Result<()> {
    conn.execute(
        "UPDATE counts SET value = ?1 WHERE id = ?2",
        params![value, count_id],
    )?;
    Ok(())
}

/// Most recently created count for the counter, by id.
pub fn latest_count(conn: &Connection, counter_id: i64) -> Result<Option<Count>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {COUNT_COLUMNS} FROM counts WHERE counter_id = ?1 ORDER BY id DESC LIMIT 1"
            ),
            params![counter_id],
            count_from_row,
        )
        .optional()?)
}

/// All counts for the counter, newest first.
pub fn load_counts(conn: &Connection, counter_id: i64) -> Result<Vec<Count>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUNT_COLUMNS} FROM counts WHERE counter_id = ?1 ORDER BY created_at DESC, id DESC"
    ))?;
    let counts = stmt
        .query_map(params![counter_id], count_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(counts)
}

fn counter_from_row(row: &Row<'_>) -> rusqlite::Result<Counter> {
    Ok(Counter {
        id: row.get(0)?,
        name: row.get(1)?,
        frequency: row.get(2)?,
        timezone: row.get(3)?,
        created_at: millis_to_utc(4, row.get(4)?)?,
    })
}

fn count_from_row(row: &Row<'_>) -> rusqlite::Result<Count> {
    Ok(Count {
        id: row.get(0)?,
        counter_id: row.get(1)?,
        value: row.get(2)?,
        expiry: millis_to_utc(3, row.get(3)?)?,
        created_at: millis_to_utc(4, row.get(4)?)?,
    })
}

fn millis_to_utc(column: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            format!("timestamp out of range: {ms}").into(),
        )
    })
}

// Rows store millisecond precision; keep returned structs equal to reloaded ones.
fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(instant.timestamp_millis())
        .single()
        .unwrap_or(instant)
}
