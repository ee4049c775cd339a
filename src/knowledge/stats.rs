use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// Response from `get_statistics`.
#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_lessons: u64,
    pub total_errors: u64,
    pub total_patterns: u64,
    pub total_sessions: u64,
    pub total_tags: u64,
    pub total_error_occurrences: u64,
    pub lessons_by_category: BTreeMap<String, u64>,
    pub top_technologies: Vec<TechnologyCount>,
    pub most_common_errors: Vec<ErrorSummary>,
    pub recent_lessons: Vec<LessonSummary>,
    pub db_size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct TechnologyCount {
    pub technology: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorSummary {
    pub id: i64,
    pub technology: String,
    /// First 100 characters.
    pub error_pattern: String,
    pub occurrence_count: u32,
}

#[derive(Debug, Serialize)]
pub struct LessonSummary {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub technology: Option<String>,
    pub created_at: String,
}

/// One row of `list_technologies`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TechnologyUsage {
    pub technology: String,
    pub lesson_count: u64,
    pub error_count: u64,
    pub total: u64,
}

/// Dashboard numbers for the whole store.
///
/// `db_path` is used for file size; pass None for in-memory databases.
pub fn statistics(conn: &Connection, db_path: Option<&Path>) -> Result<Statistics> {
    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(Statistics {
        total_lessons: count(conn, "SELECT COUNT(*) FROM lessons")?,
        total_errors: count(conn, "SELECT COUNT(*) FROM common_errors")?,
        total_patterns: count(conn, "SELECT COUNT(*) FROM patterns")?,
        total_sessions: count(conn, "SELECT COUNT(*) FROM sessions")?,
        total_tags: count(conn, "SELECT COUNT(*) FROM tags")?,
        total_error_occurrences: count(
            conn,
            "SELECT COALESCE(SUM(occurrence_count), 0) FROM common_errors",
        )?,
        lessons_by_category: lessons_by_category(conn)?,
        top_technologies: top_technologies(conn)?,
        most_common_errors: most_common_errors(conn)?,
        recent_lessons: recent_lessons(conn)?,
        db_size_bytes,
    })
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

fn lessons_by_category(conn: &Connection) -> Result<BTreeMap<String, u64>> {
    let mut stmt = conn.prepare("SELECT category, COUNT(*) FROM lessons GROUP BY category")?;
    let map = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(map)
}

fn top_technologies(conn: &Connection) -> Result<Vec<TechnologyCount>> {
    let mut stmt = conn.prepare(
        "SELECT technology, COUNT(*) AS n FROM lessons \
         WHERE technology IS NOT NULL \
         GROUP BY technology ORDER BY n DESC, technology ASC LIMIT 10",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TechnologyCount {
                technology: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn most_common_errors(conn: &Connection) -> Result<Vec<ErrorSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, technology, error_pattern, occurrence_count FROM common_errors \
         ORDER BY occurrence_count DESC, id DESC LIMIT 5",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let pattern: String = row.get(2)?;
            Ok(ErrorSummary {
                id: row.get(0)?,
                technology: row.get(1)?,
                error_pattern: pattern.chars().take(100).collect(),
                occurrence_count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn recent_lessons(conn: &Connection) -> Result<Vec<LessonSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, category, technology, created_at FROM lessons \
         ORDER BY created_at DESC, id DESC LIMIT 5",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LessonSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                category: row.get(2)?,
                technology: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every technology mentioned by a lesson or error, alphabetically.
pub fn list_technologies(conn: &Connection) -> Result<Vec<TechnologyUsage>> {
    let mut counts: BTreeMap<String, (u64, u64)> = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT technology, COUNT(*) FROM lessons WHERE technology IS NOT NULL GROUP BY technology",
    )?;
    for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
        let (tech, n) = row?;
        counts.entry(tech).or_default().0 = n as u64;
    }

    let mut stmt =
        conn.prepare("SELECT technology, COUNT(*) FROM common_errors GROUP BY technology")?;
    for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
        let (tech, n) = row?;
        counts.entry(tech).or_default().1 = n as u64;
    }

    Ok(counts
        .into_iter()
        .map(|(technology, (lesson_count, error_count))| TechnologyUsage {
            technology,
            lesson_count,
            error_count,
            total: lesson_count + error_count,
        })
        .collect())
}
