//! Row-level persistence for lessons, error records, patterns and sessions.
//!
//! These functions run against whatever connection or transaction they are handed and
//! do not touch tags or the text index; the composites in [`crate::knowledge::store`]
//! combine them. Missing rows surface as [`StoreError::NotFound`].

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{Result, StoreError};
use crate::knowledge::tags::tags_for;
use crate::knowledge::types::{
    now_timestamp, optional_text, EntityId, EntityKind, ErrorRecord, ErrorRecordUpdate, IndexedKind,
    Lesson, LessonCategory, LessonUpdate, NewErrorRecord, NewLesson, NewPattern, NewSession,
    Pattern, PatternUpdate, Session,
};

const LESSON_COLUMNS: &str = "id, title, content, category, technology, project_context, \
                              source_session, created_at, updated_at";
const ERROR_COLUMNS: &str = "id, technology, error_pattern, root_cause, solution, code_example, \
                             occurrence_count, created_at, updated_at";
const PATTERN_COLUMNS: &str = "id, pattern_name, description, code_example, when_to_use, \
                               when_not_to_use, related_apis, platform_version, language_version, \
                               created_at, updated_at";
const SESSION_COLUMNS: &str = "id, date, project_name, log_reference, summary, created_at";

/// Filters for listing rows without a text query.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Exact technology match (lessons and errors).
    pub technology: Option<String>,
    /// Lessons only.
    pub category: Option<LessonCategory>,
    /// Sessions only.
    pub project_name: Option<String>,
    pub limit: Option<usize>,
}

// ── Lessons ───────────────────────────────────────────────────────────────────

pub fn insert_lesson(
    conn: &Connection,
    input: &NewLesson,
    category: LessonCategory,
) -> Result<EntityId> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO lessons (title, content, category, technology, project_context, source_session, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            input.title,
            input.content,
            category.as_str(),
            input.technology.as_deref().and_then(optional_text),
            input.project_context.as_deref().and_then(optional_text),
            input.source_session.as_deref().and_then(optional_text),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_lesson(conn: &Connection, id: EntityId) -> Result<Lesson> {
    let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1");
    let mut lesson = conn
        .query_row(&sql, params![id], lesson_from_row)
        .optional()?
        .ok_or(StoreError::NotFound {
            kind: EntityKind::Lesson,
            id,
        })?;
    lesson.tags = tags_for(conn, IndexedKind::Lesson, id)?;
    Ok(lesson)
}

/// Apply the fields present in `update` and refresh `updated_at`.
pub fn update_lesson(
    conn: &Connection,
    id: EntityId,
    update: &LessonUpdate,
    category: Option<LessonCategory>,
) -> Result<()> {
    let mut set = Assignments::default();
    set.required("title", update.title.as_deref());
    set.required("content", update.content.as_deref());
    set.required("category", category.map(|c| c.as_str()));
    set.optional("technology", update.technology.as_deref());
    set.optional("project_context", update.project_context.as_deref());
    set.optional("source_session", update.source_session.as_deref());
    set.apply(conn, IndexedKind::Lesson.table(), EntityKind::Lesson, id)
}

pub fn list_lessons(conn: &Connection, filter: &ListFilter) -> Result<Vec<Lesson>> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(tech) = &filter.technology {
        clauses.push("technology = ?");
        values.push(Value::Text(tech.clone()));
    }
    if let Some(category) = filter.category {
        clauses.push("category = ?");
        values.push(Value::Text(category.as_str().to_string()));
    }
    let sql = list_sql(LESSON_COLUMNS, "lessons", &clauses, filter.limit);
    let mut stmt = conn.prepare(&sql)?;
    let mut lessons = stmt
        .query_map(params_from_iter(values), lesson_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for lesson in &mut lessons {
        lesson.tags = tags_for(conn, IndexedKind::Lesson, lesson.id)?;
    }
    Ok(lessons)
}

fn lesson_from_row(row: &Row) -> rusqlite::Result<Lesson> {
    let category: String = row.get(3)?;
    Ok(Lesson {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: category.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?,
        technology: row.get(4)?,
        project_context: row.get(5)?,
        source_session: row.get(6)?,
        tags: Vec::new(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ── Error records ─────────────────────────────────────────────────────────────

pub fn insert_error_record(conn: &Connection, input: &NewErrorRecord) -> Result<EntityId> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO common_errors (technology, error_pattern, root_cause, solution, code_example, occurrence_count, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        params![
            input.technology,
            input.error_pattern,
            input.root_cause.as_deref().and_then(optional_text),
            input.solution,
            input.code_example.as_deref().and_then(optional_text),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_error_record(conn: &Connection, id: EntityId) -> Result<ErrorRecord> {
    let sql = format!("SELECT {ERROR_COLUMNS} FROM common_errors WHERE id = ?1");
    let mut record = conn
        .query_row(&sql, params![id], error_from_row)
        .optional()?
        .ok_or(StoreError::NotFound {
            kind: EntityKind::ErrorRecord,
            id,
        })?;
    record.tags = tags_for(conn, IndexedKind::ErrorRecord, id)?;
    Ok(record)
}

pub fn update_error_record(
    conn: &Connection,
    id: EntityId,
    update: &ErrorRecordUpdate,
) -> Result<()> {
    let mut set = Assignments::default();
    set.required("technology", update.technology.as_deref());
    set.required("error_pattern", update.error_pattern.as_deref());
    set.required("solution", update.solution.as_deref());
    set.optional("root_cause", update.root_cause.as_deref());
    set.optional("code_example", update.code_example.as_deref());
    set.apply(
        conn,
        IndexedKind::ErrorRecord.table(),
        EntityKind::ErrorRecord,
        id,
    )
}

/// Add one occurrence and return the new count.
pub fn increment_occurrences(conn: &Connection, id: EntityId) -> Result<u32> {
    let current: u32 = conn
        .query_row(
            "SELECT occurrence_count FROM common_errors WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StoreError::NotFound {
            kind: EntityKind::ErrorRecord,
            id,
        })?;

    let next = current.saturating_add(1);
    conn.execute(
        "UPDATE common_errors SET occurrence_count = ?1, updated_at = MAX(?2, created_at) WHERE id = ?3",
        params![next, now_timestamp(), id],
    )?;
    Ok(next)
}

pub fn list_error_records(conn: &Connection, filter: &ListFilter) -> Result<Vec<ErrorRecord>> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(tech) = &filter.technology {
        clauses.push("technology = ?");
        values.push(Value::Text(tech.clone()));
    }
    let sql = list_sql(ERROR_COLUMNS, "common_errors", &clauses, filter.limit);
    let mut stmt = conn.prepare(&sql)?;
    let mut records = stmt
        .query_map(params_from_iter(values), error_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for record in &mut records {
        record.tags = tags_for(conn, IndexedKind::ErrorRecord, record.id)?;
    }
    Ok(records)
}

fn error_from_row(row: &Row) -> rusqlite::Result<ErrorRecord> {
    Ok(ErrorRecord {
        id: row.get(0)?,
        technology: row.get(1)?,
        error_pattern: row.get(2)?,
        root_cause: row.get(3)?,
        solution: row.get(4)?,
        code_example: row.get(5)?,
        occurrence_count: row.get(6)?,
        tags: Vec::new(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ── Patterns ──────────────────────────────────────────────────────────────────

pub fn insert_pattern(conn: &Connection, input: &NewPattern) -> Result<EntityId> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO patterns (pattern_name, description, code_example, when_to_use, when_not_to_use, related_apis, platform_version, language_version, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            input.pattern_name,
            input.description,
            input.code_example,
            input.when_to_use.as_deref().and_then(optional_text),
            input.when_not_to_use.as_deref().and_then(optional_text),
            encode_apis(&input.related_apis)?,
            input.platform_version.as_deref().and_then(optional_text),
            input.language_version.as_deref().and_then(optional_text),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_pattern(conn: &Connection, id: EntityId) -> Result<Pattern> {
    let sql = format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE id = ?1");
    let mut pattern = conn
        .query_row(&sql, params![id], pattern_from_row)
        .optional()?
        .ok_or(StoreError::NotFound {
            kind: EntityKind::Pattern,
            id,
        })?;
    pattern.tags = tags_for(conn, IndexedKind::Pattern, id)?;
    Ok(pattern)
}

pub fn update_pattern(conn: &Connection, id: EntityId, update: &PatternUpdate) -> Result<()> {
    let mut set = Assignments::default();
    set.required("pattern_name", update.pattern_name.as_deref());
    set.required("description", update.description.as_deref());
    set.required("code_example", update.code_example.as_deref());
    set.optional("when_to_use", update.when_to_use.as_deref());
    set.optional("when_not_to_use", update.when_not_to_use.as_deref());
    set.optional("platform_version", update.platform_version.as_deref());
    set.optional("language_version", update.language_version.as_deref());
    if let Some(apis) = &update.related_apis {
        let encoded = encode_apis(apis)?;
        set.push("related_apis", encoded.map(Value::Text).unwrap_or(Value::Null));
    }
    set.apply(conn, IndexedKind::Pattern.table(), EntityKind::Pattern, id)
}

pub fn list_patterns(conn: &Connection, filter: &ListFilter) -> Result<Vec<Pattern>> {
    let sql = list_sql(PATTERN_COLUMNS, "patterns", &[], filter.limit);
    let mut stmt = conn.prepare(&sql)?;
    let mut patterns = stmt
        .query_map([], pattern_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for pattern in &mut patterns {
        pattern.tags = tags_for(conn, IndexedKind::Pattern, pattern.id)?;
    }
    Ok(patterns)
}

fn pattern_from_row(row: &Row) -> rusqlite::Result<Pattern> {
    let related: Option<String> = row.get(6)?;
    Ok(Pattern {
        id: row.get(0)?,
        pattern_name: row.get(1)?,
        description: row.get(2)?,
        code_example: row.get(3)?,
        when_to_use: row.get(4)?,
        when_not_to_use: row.get(5)?,
        related_apis: decode_apis(related.as_deref()),
        platform_version: row.get(7)?,
        language_version: row.get(8)?,
        tags: Vec::new(),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Related APIs are stored as a JSON array; an empty list is stored as NULL.
fn encode_apis(apis: &[String]) -> Result<Option<String>> {
    if apis.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(apis)?))
}

fn decode_apis(stored: Option<&str>) -> Vec<String> {
    match stored {
        None | Some("") => Vec::new(),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| vec![text.to_string()]),
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────────

pub fn insert_session(conn: &Connection, input: &NewSession) -> Result<EntityId> {
    conn.execute(
        "INSERT INTO sessions (date, project_name, log_reference, summary, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            input.date,
            input.project_name.as_deref().and_then(optional_text),
            input.log_reference.as_deref().and_then(optional_text),
            input.summary.as_deref().and_then(optional_text),
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_session(conn: &Connection, id: EntityId) -> Result<Session> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    conn.query_row(&sql, params![id], session_from_row)
        .optional()?
        .ok_or(StoreError::NotFound {
            kind: EntityKind::Session,
            id,
        })
}

/// Sessions, most recent date first.
pub fn list_sessions(conn: &Connection, filter: &ListFilter) -> Result<Vec<Session>> {
    let mut sql = format!("SELECT {SESSION_COLUMNS} FROM sessions");
    let mut values = Vec::new();
    if let Some(project) = &filter.project_name {
        sql.push_str(" WHERE project_name = ?");
        values.push(Value::Text(project.clone()));
    }
    sql.push_str(" ORDER BY date DESC, id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(params_from_iter(values), session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        date: row.get(1)?,
        project_name: row.get(2)?,
        log_reference: row.get(3)?,
        summary: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// ── Shared ────────────────────────────────────────────────────────────────────

/// Fail with `NotFound` unless the row exists.
pub fn ensure_exists(conn: &Connection, kind: IndexedKind, id: EntityId) -> Result<()> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", kind.table());
    let found: Option<i64> = conn.query_row(&sql, params![id], |row| row.get(0)).optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound {
            kind: kind.entity_kind(),
            id,
        }),
    }
}

/// Delete the primary row only. Links and posting are the caller's business.
pub fn delete_row(conn: &Connection, kind: IndexedKind, id: EntityId) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
    let deleted = conn.execute(&sql, params![id])?;
    if deleted == 0 {
        return Err(StoreError::NotFound {
            kind: kind.entity_kind(),
            id,
        });
    }
    Ok(())
}

fn list_sql(columns: &str, table: &str, clauses: &[&str], limit: Option<usize>) -> String {
    let mut sql = format!("SELECT {columns} FROM {table}");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

/// Column assignments for a partial update.
#[derive(Default)]
struct Assignments {
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl Assignments {
    fn push(&mut self, column: &'static str, value: Value) {
        self.columns.push(column);
        self.values.push(value);
    }

    fn required(&mut self, column: &'static str, value: Option<&str>) {
        if let Some(v) = value {
            self.push(column, Value::Text(v.to_string()));
        }
    }

    /// An empty string stores NULL.
    fn optional(&mut self, column: &'static str, value: Option<&str>) {
        if let Some(v) = value {
            let value = optional_text(v).map_or(Value::Null, |v| Value::Text(v.to_string()));
            self.push(column, value);
        }
    }

    /// `updated_at` never goes below `created_at`, even if the clock stepped back.
    fn apply(
        mut self,
        conn: &Connection,
        table: &str,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<()> {
        let mut sets: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect();
        let n = self.values.len();
        sets.push(format!("updated_at = MAX(?{}, created_at)", n + 1));
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?{}",
            sets.join(", "),
            n + 2
        );

        self.values.push(Value::Text(now_timestamp()));
        self.values.push(Value::Integer(id));
        let changed = conn.execute(&sql, params_from_iter(self.values))?;
        if changed == 0 {
            return Err(StoreError::NotFound { kind, id });
        }
        Ok(())
    }
}
