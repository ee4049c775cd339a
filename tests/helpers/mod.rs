#![allow(dead_code)]

use hindsight::config::StorageConfig;
use hindsight::db::ConnectionManager;
use hindsight::knowledge::index::check_index;
use hindsight::knowledge::types::{NewErrorRecord, NewLesson, NewPattern};
use hindsight::knowledge::IndexedKind;
use tempfile::TempDir;

/// A store in a fresh temp directory. The directory lives as long as this value.
pub struct TestStore {
    pub db: ConnectionManager,
    pub dir: TempDir,
}

/// Open a fresh file-backed store. Retries do not actually sleep.
pub fn test_store() -> TestStore {
    let dir = TempDir::new().unwrap();
    let db = ConnectionManager::open(&StorageConfig::at(dir.path().join("knowledge.db")))
        .unwrap()
        .with_sleeper(|_| {});
    TestStore { db, dir }
}

pub fn lesson(title: &str, content: &str, tags: &[&str]) -> NewLesson {
    NewLesson {
        title: title.into(),
        content: content.into(),
        category: "gotcha".into(),
        technology: Some("swift".into()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

pub fn error_record(technology: &str, pattern: &str, tags: &[&str]) -> NewErrorRecord {
    NewErrorRecord {
        technology: technology.into(),
        error_pattern: pattern.into(),
        solution: "Add the missing conformance".into(),
        root_cause: Some("Protocol requirement not met".into()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

pub fn pattern(name: &str, description: &str, tags: &[&str]) -> NewPattern {
    NewPattern {
        pattern_name: name.into(),
        description: description.into(),
        code_example: "actor Store { var items: [String: Data] = [:] }".into(),
        when_to_use: Some("Shared mutable state across tasks".into()),
        related_apis: vec!["actor".into()],
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

/// Row, posting, link and tag counts across the whole store.
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub lessons: i64,
    pub errors: i64,
    pub patterns: i64,
    pub sessions: i64,
    pub tags: i64,
    pub links: i64,
    pub lesson_postings: i64,
    pub error_postings: i64,
    pub pattern_postings: i64,
    pub max_updated_at: Option<String>,
    pub occurrences: i64,
}

pub fn snapshot(db: &ConnectionManager) -> Snapshot {
    db.with_connection(|conn| {
        let n = |sql: &str| -> i64 { conn.query_row(sql, [], |row| row.get(0)).unwrap() };
        Ok(Snapshot {
            lessons: n("SELECT COUNT(*) FROM lessons"),
            errors: n("SELECT COUNT(*) FROM common_errors"),
            patterns: n("SELECT COUNT(*) FROM patterns"),
            sessions: n("SELECT COUNT(*) FROM sessions"),
            tags: n("SELECT COUNT(*) FROM tags"),
            links: n("SELECT COUNT(*) FROM entity_tags"),
            lesson_postings: n("SELECT COUNT(*) FROM lessons_fts"),
            error_postings: n("SELECT COUNT(*) FROM errors_fts"),
            pattern_postings: n("SELECT COUNT(*) FROM patterns_fts"),
            max_updated_at: conn
                .query_row(
                    "SELECT MAX(updated_at) FROM (SELECT updated_at FROM lessons \
                     UNION ALL SELECT updated_at FROM common_errors \
                     UNION ALL SELECT updated_at FROM patterns)",
                    [],
                    |row| row.get(0),
                )
                .unwrap(),
            occurrences: n("SELECT COALESCE(SUM(occurrence_count), 0) FROM common_errors"),
        })
    })
    .unwrap()
}

/// Every indexed kind has exactly one up-to-date posting per row.
pub fn assert_index_consistent(db: &ConnectionManager) {
    db.with_connection(|conn| {
        for kind in IndexedKind::ALL {
            let report = check_index(conn, kind)?;
            assert!(report.is_clean(), "index drift for {kind}: {report:?}");
            assert_eq!(report.rows, report.postings, "posting count for {kind}");
        }
        Ok(())
    })
    .unwrap();
}
