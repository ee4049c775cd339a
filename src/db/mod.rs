pub mod connection;
pub mod schema;

pub use connection::{ConnectionManager, RetryPolicy};

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;

/// One-time setup for a store file: WAL journaling, foreign keys and schema.
pub fn prepare_store(conn: &Connection) -> Result<()> {
    // WAL lets readers proceed while a writer holds the lock
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(conn)?;
    tracing::debug!(journal_mode = %mode, "schema initialized");
    Ok(())
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub lesson_count: u64,
    pub error_count: u64,
    pub pattern_count: u64,
    pub session_count: u64,
    pub tag_count: u64,
}

/// SQLite integrity check plus row counts per table.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let count = |table: &str| -> rusqlite::Result<u64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as u64)
    };

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        integrity_details,
        schema_version: schema::get_schema_version(conn)?,
        lesson_count: count("lessons")?,
        error_count: count("common_errors")?,
        pattern_count: count("patterns")?,
        session_count: count("sessions")?,
        tag_count: count("tags")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_passes_on_fresh_store() {
        let conn = Connection::open_in_memory().unwrap();
        prepare_store(&conn).unwrap();

        let report = check_database_health(&conn).unwrap();
        assert!(report.integrity_ok);
        assert_eq!(report.schema_version, schema::CURRENT_SCHEMA_VERSION);
        assert_eq!(report.lesson_count, 0);
        assert_eq!(report.tag_count, 0);
    }
}
