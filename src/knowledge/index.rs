//! Keeps the FTS5 tables in step with the primary tables.
//!
//! Each indexed kind has one FTS5 table whose `rowid` is the primary row id and whose
//! columns copy the searchable columns (NULL copied as empty text). The write path calls
//! [`add_posting`], [`replace_posting`] and [`remove_posting`] inside the same
//! transaction as the row change. [`check_index`] reports any drift and
//! [`rebuild_index`] repairs it.

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::ConnectionManager;
use crate::error::{Result, StoreError};
use crate::knowledge::transaction::{run_atomic, Composite};
use crate::knowledge::types::{EntityId, IndexedKind};

/// FTS table and copied columns for one kind.
pub(crate) struct IndexSpec {
    pub fts_table: &'static str,
    pub columns: &'static [&'static str],
}

pub(crate) fn spec(kind: IndexedKind) -> IndexSpec {
    match kind {
        IndexedKind::Lesson => IndexSpec {
            fts_table: "lessons_fts",
            columns: &["title", "content", "technology"],
        },
        IndexedKind::ErrorRecord => IndexSpec {
            fts_table: "errors_fts",
            columns: &["technology", "error_pattern", "root_cause", "solution"],
        },
        IndexedKind::Pattern => IndexSpec {
            fts_table: "patterns_fts",
            columns: &[
                "pattern_name",
                "description",
                "code_example",
                "when_to_use",
                "related_apis",
            ],
        },
    }
}

/// `INSERT INTO fts(rowid, cols) SELECT id, COALESCE(col, '') ... FROM table`
fn copy_sql(kind: IndexedKind, filter: &str) -> String {
    let spec = spec(kind);
    let sources: Vec<String> = spec
        .columns
        .iter()
        .map(|c| format!("COALESCE({c}, '')"))
        .collect();
    format!(
        "INSERT INTO {fts}(rowid, {cols}) SELECT id, {sources} FROM {table} {filter}",
        fts = spec.fts_table,
        cols = spec.columns.join(", "),
        sources = sources.join(", "),
        table = kind.table(),
    )
}

/// Create the posting for a row that has none yet.
pub fn add_posting(conn: &Connection, kind: IndexedKind, id: EntityId) -> Result<()> {
    let inserted = conn.execute(&copy_sql(kind, "WHERE id = ?1"), params![id])?;
    if inserted == 0 {
        return Err(StoreError::NotFound {
            kind: kind.entity_kind(),
            id,
        });
    }
    Ok(())
}

/// Swap the posting for one built from the row's current values.
pub fn replace_posting(conn: &Connection, kind: IndexedKind, id: EntityId) -> Result<()> {
    remove_posting(conn, kind, id)?;
    add_posting(conn, kind, id)
}

/// Drop the posting if there is one. Returns whether anything was removed.
pub fn remove_posting(conn: &Connection, kind: IndexedKind, id: EntityId) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE rowid = ?1", spec(kind).fts_table);
    Ok(conn.execute(&sql, params![id])? > 0)
}

pub fn posting_count(conn: &Connection, kind: IndexedKind) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", spec(kind).fts_table);
    let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Differences between a primary table and its text index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub kind: IndexedKind,
    pub rows: u64,
    pub postings: u64,
    /// Postings with no primary row.
    pub orphaned: Vec<EntityId>,
    /// Rows with no posting.
    pub missing: Vec<EntityId>,
    /// Postings whose text no longer matches the row.
    pub stale: Vec<EntityId>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.missing.is_empty() && self.stale.is_empty()
    }
}

/// Compare one kind's primary rows against its postings.
pub fn check_index(conn: &Connection, kind: IndexedKind) -> Result<DriftReport> {
    let spec = spec(kind);
    let table = kind.table();
    let fts = spec.fts_table;

    let ids = |sql: String| -> Result<Vec<EntityId>> {
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<EntityId>, _>>()?;
        Ok(ids)
    };

    let orphaned = ids(format!(
        "SELECT rowid FROM {fts} WHERE rowid NOT IN (SELECT id FROM {table}) ORDER BY rowid"
    ))?;
    let missing = ids(format!(
        "SELECT id FROM {table} WHERE id NOT IN (SELECT rowid FROM {fts}) ORDER BY id"
    ))?;
    let differs: Vec<String> = spec
        .columns
        .iter()
        .map(|c| format!("f.{c} IS NOT COALESCE(s.{c}, '')"))
        .collect();
    let stale = ids(format!(
        "SELECT s.id FROM {table} s JOIN {fts} f ON f.rowid = s.id WHERE {} ORDER BY s.id",
        differs.join(" OR ")
    ))?;

    let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;

    Ok(DriftReport {
        kind,
        rows: rows as u64,
        postings: posting_count(conn, kind)?,
        orphaned,
        missing,
        stale,
    })
}

/// Check one kind and fail with [`StoreError::IndexDrift`] if it is out of step.
pub fn verify_index(db: &ConnectionManager, kind: IndexedKind) -> Result<DriftReport> {
    let report = db.with_snapshot(|tx| check_index(tx, kind))?;
    if report.is_clean() {
        Ok(report)
    } else {
        warn!(
            kind = %kind,
            orphaned = report.orphaned.len(),
            missing = report.missing.len(),
            stale = report.stale.len(),
            "text index drift detected"
        );
        Err(StoreError::IndexDrift(report))
    }
}

/// Throw away every posting of `kind` and rebuild from the primary table in one
/// transaction. Returns the number of postings written.
pub fn rebuild_index(db: &ConnectionManager, kind: IndexedKind) -> Result<u64> {
    let fts = spec(kind).fts_table;
    let mut composite = Composite::new("RebuildIndex")
        .step("clear postings", move |tx, _| {
            tx.execute(&format!("DELETE FROM {fts}"), [])?;
            Ok(())
        })
        .step("repopulate", move |tx, ctx| {
            let written = tx.execute(&copy_sql(kind, ""), [])?;
            ctx.count = Some(written as u64);
            Ok(())
        });

    let ctx = run_atomic(db, &mut composite)?;
    let written = ctx.count.unwrap_or(0);
    info!(kind = %kind, postings = written, "text index rebuilt");
    Ok(written)
}
