//! SQL DDL for all Hindsight tables.
//!
//! Defines the primary tables (`lessons`, `common_errors`, `patterns`, `sessions`),
//! the tag tables (`tags`, `entity_tags`), one FTS5 table per searchable kind and
//! `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent initialization.
//!
//! The FTS5 tables hold their own copy of the searchable columns and are keyed by
//! the primary row id. Nothing keeps them in sync automatically; see
//! [`crate::knowledge::index`].

use rusqlite::Connection;

/// The schema version that the current binary writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS lessons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK(length(title) > 0),
    content TEXT NOT NULL CHECK(length(content) > 0),
    category TEXT NOT NULL CHECK(category IN ('pattern','practice','gotcha','decision')),
    technology TEXT,
    project_context TEXT,
    source_session TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK(updated_at >= created_at)
);

CREATE INDEX IF NOT EXISTS idx_lessons_category ON lessons(category);
CREATE INDEX IF NOT EXISTS idx_lessons_technology ON lessons(technology);
CREATE INDEX IF NOT EXISTS idx_lessons_created ON lessons(created_at);

CREATE TABLE IF NOT EXISTS common_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    technology TEXT NOT NULL CHECK(length(technology) > 0),
    error_pattern TEXT NOT NULL CHECK(length(error_pattern) > 0),
    root_cause TEXT,
    solution TEXT NOT NULL CHECK(length(solution) > 0),
    code_example TEXT,
    occurrence_count INTEGER NOT NULL DEFAULT 1 CHECK(occurrence_count >= 1),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK(updated_at >= created_at)
);

CREATE INDEX IF NOT EXISTS idx_errors_technology ON common_errors(technology);
CREATE INDEX IF NOT EXISTS idx_errors_created ON common_errors(created_at);

CREATE TABLE IF NOT EXISTS patterns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pattern_name TEXT NOT NULL CHECK(length(pattern_name) > 0),
    description TEXT NOT NULL CHECK(length(description) > 0),
    code_example TEXT NOT NULL CHECK(length(code_example) > 0),
    when_to_use TEXT,
    when_not_to_use TEXT,
    related_apis TEXT,
    platform_version TEXT,
    language_version TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK(updated_at >= created_at)
);

CREATE INDEX IF NOT EXISTS idx_patterns_created ON patterns(created_at);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    project_name TEXT,
    log_reference TEXT,
    summary TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);
CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_name);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK(length(name) > 0),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entity_tags (
    entity_kind TEXT NOT NULL CHECK(entity_kind IN ('lesson','error','pattern')),
    entity_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (entity_kind, entity_id, tag_id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_entity_tags_tag ON entity_tags(tag_id);

CREATE VIRTUAL TABLE IF NOT EXISTS lessons_fts USING fts5(
    title,
    content,
    technology,
    tokenize = 'porter unicode61'
);

CREATE VIRTUAL TABLE IF NOT EXISTS errors_fts USING fts5(
    technology,
    error_pattern,
    root_cause,
    solution,
    tokenize = 'porter unicode61'
);

CREATE VIRTUAL TABLE IF NOT EXISTS patterns_fts USING fts5(
    pattern_name,
    description,
    code_example,
    when_to_use,
    related_apis,
    tokenize = 'porter unicode61'
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the schema version recorded in the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "lessons",
            "common_errors",
            "patterns",
            "sessions",
            "tags",
            "entity_tags",
            "lessons_fts",
            "errors_fts",
            "patterns_fts",
            "schema_meta",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn occurrence_count_cannot_drop_below_one() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO common_errors (technology, error_pattern, solution, created_at, updated_at) \
             VALUES ('rust', 'E0382', 'clone it', '2025-01-01', '2025-01-01')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE common_errors SET occurrence_count = 0", []);
        assert!(result.is_err());
    }

    #[test]
    fn lesson_category_is_checked() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO lessons (title, content, category, created_at, updated_at) \
             VALUES ('t', 'c', 'recipe', '2025-01-01', '2025-01-01')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn porter_tokenizer_matches_word_forms() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO lessons_fts (rowid, title, content, technology) VALUES (1, 'Caching', 'Memory leaks', '')",
            [],
        )
        .unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM lessons_fts WHERE lessons_fts MATCH '\"cache\" \"leak\"'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }
}
