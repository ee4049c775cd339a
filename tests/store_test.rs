mod helpers;

use helpers::{assert_index_consistent, error_record, lesson, pattern, snapshot, test_store};
use hindsight::error::StoreError;
use hindsight::knowledge::entities;
use hindsight::knowledge::types::{
    EntityKind, ErrorRecordUpdate, LessonCategory, LessonUpdate, NewLesson, NewSession,
    PatternUpdate,
};
use hindsight::knowledge::{self, IndexedKind, SearchConfig, SearchKind, SearchRequest};

fn find(db: &hindsight::db::ConnectionManager, kind: SearchKind, text: &str) -> Vec<i64> {
    let request = SearchRequest {
        kind,
        text: text.into(),
        ..Default::default()
    };
    knowledge::search(db, &request, &SearchConfig::default())
        .unwrap()
        .results
        .iter()
        .map(|hit| hit.id)
        .collect()
}

#[test]
fn added_lesson_is_found_by_its_title() {
    let store = test_store();
    let id = knowledge::add_lesson(
        &store.db,
        &lesson(
            "Weak self in escaping closures",
            "Capture self weakly to avoid retain cycles",
            &[],
        ),
    )
    .unwrap();

    assert_eq!(find(&store.db, SearchKind::Lesson, "Weak self in escaping closures"), vec![id]);
    assert_index_consistent(&store.db);
}

#[test]
fn lesson_round_trips_with_tags() {
    let store = test_store();
    let id = knowledge::add_lesson(
        &store.db,
        &lesson("Title", "Content", &["swiftui", "state", "swiftui"]),
    )
    .unwrap();

    let stored = store
        .db
        .with_connection(|conn| entities::get_lesson(conn, id))
        .unwrap();
    assert_eq!(stored.category, LessonCategory::Gotcha);
    assert_eq!(stored.technology.as_deref(), Some("swift"));
    assert_eq!(stored.tags, vec!["state", "swiftui"]);
    assert_eq!(snapshot(&store.db).tags, 2);
}

#[test]
fn validation_fails_before_touching_storage() {
    let store = test_store();
    let before = snapshot(&store.db);

    let bad = NewLesson {
        category: "recipe".into(),
        ..lesson("t", "c", &[])
    };
    assert!(matches!(
        knowledge::add_lesson(&store.db, &bad),
        Err(StoreError::ValidationFailed { field: "category", .. })
    ));

    let bad_session = NewSession {
        date: "yesterday".into(),
        ..Default::default()
    };
    assert!(matches!(
        knowledge::add_session(&store.db, &bad_session),
        Err(StoreError::ValidationFailed { field: "date", .. })
    ));

    assert_eq!(snapshot(&store.db), before);
}

#[test]
fn update_replaces_tags_and_reindexes() {
    let store = test_store();
    let id = knowledge::add_lesson(&store.db, &lesson("Old title", "body", &["a", "b"])).unwrap();

    let update = LessonUpdate {
        title: Some("Fresh heading".into()),
        tags: Some(vec!["c".into()]),
        ..Default::default()
    };
    knowledge::update_lesson(&store.db, id, &update).unwrap();

    assert_eq!(find(&store.db, SearchKind::Lesson, "fresh heading"), vec![id]);
    assert!(find(&store.db, SearchKind::Lesson, "old title").is_empty());
    let stored = store
        .db
        .with_connection(|conn| entities::get_lesson(conn, id))
        .unwrap();
    assert_eq!(stored.tags, vec!["c"]);
    assert!(stored.updated_at >= stored.created_at);
    assert_index_consistent(&store.db);
}

#[test]
fn replacing_tags_with_the_same_set_is_idempotent() {
    let store = test_store();
    let id = knowledge::add_lesson(&store.db, &lesson("t", "c", &["x", "y"])).unwrap();
    let update = LessonUpdate {
        tags: Some(vec!["x".into(), "y".into()]),
        ..Default::default()
    };

    knowledge::update_lesson(&store.db, id, &update).unwrap();
    let once = snapshot(&store.db);
    knowledge::update_lesson(&store.db, id, &update).unwrap();
    let twice = snapshot(&store.db);

    assert_eq!(once.links, 2);
    assert_eq!(once.links, twice.links);
    assert_eq!(once.tags, twice.tags);
}

#[test]
fn updating_missing_lesson_is_not_found() {
    let store = test_store();
    let update = LessonUpdate {
        title: Some("x".into()),
        ..Default::default()
    };
    assert!(matches!(
        knowledge::update_lesson(&store.db, 404, &update),
        Err(StoreError::NotFound { kind: EntityKind::Lesson, id: 404 })
    ));
}

#[test]
fn swift_error_seen_three_times() {
    let store = test_store();
    let id = knowledge::add_error_record(
        &store.db,
        &error_record("swift", "X does not conform to Y", &[]),
    )
    .unwrap();

    assert_eq!(knowledge::increment_error_count(&store.db, id).unwrap(), 2);
    assert_eq!(knowledge::increment_error_count(&store.db, id).unwrap(), 3);

    let stored = store
        .db
        .with_connection(|conn| entities::get_error_record(conn, id))
        .unwrap();
    assert_eq!(stored.occurrence_count, 3);
    assert_eq!(find(&store.db, SearchKind::ErrorRecord, "conform"), vec![id]);
    assert_index_consistent(&store.db);
}

#[test]
fn increment_n_times_adds_exactly_n() {
    let store = test_store();
    let id = knowledge::add_error_record(&store.db, &error_record("rust", "E0382", &[])).unwrap();
    for _ in 0..7 {
        knowledge::increment_error_count(&store.db, id).unwrap();
    }
    assert_eq!(snapshot(&store.db).occurrences, 8);
    assert!(matches!(
        knowledge::increment_error_count(&store.db, id + 1),
        Err(StoreError::NotFound { kind: EntityKind::ErrorRecord, .. })
    ));
}

#[test]
fn error_and_pattern_updates_keep_index_in_step() {
    let store = test_store();
    let error_id = knowledge::add_error_record(
        &store.db,
        &error_record("swift", "Sendable warning", &["concurrency"]),
    )
    .unwrap();
    let pattern_id =
        knowledge::add_pattern(&store.db, &pattern("Task groups", "Fan out work", &[])).unwrap();

    knowledge::update_error_record(
        &store.db,
        error_id,
        &ErrorRecordUpdate {
            solution: Some("Mark the type as Sendable".into()),
            ..Default::default()
        },
    )
    .unwrap();
    knowledge::update_pattern(
        &store.db,
        pattern_id,
        &PatternUpdate {
            related_apis: Some(vec!["withTaskGroup".into()]),
            platform_version: Some("16.0".into()),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(find(&store.db, SearchKind::ErrorRecord, "mark sendable"), vec![error_id]);
    assert_eq!(find(&store.db, SearchKind::Pattern, "withTaskGroup"), vec![pattern_id]);
    assert_index_consistent(&store.db);
}

#[test]
fn every_composite_leaves_index_consistent() {
    let store = test_store();
    let lesson_id = knowledge::add_lesson(&store.db, &lesson("a", "b", &["t1"])).unwrap();
    assert_index_consistent(&store.db);
    let error_id =
        knowledge::add_error_record(&store.db, &error_record("go", "nil map", &["t1"])).unwrap();
    assert_index_consistent(&store.db);
    knowledge::add_pattern(&store.db, &pattern("p", "d", &["t2"])).unwrap();
    assert_index_consistent(&store.db);
    knowledge::update_lesson(
        &store.db,
        lesson_id,
        &LessonUpdate {
            content: Some("changed".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_index_consistent(&store.db);
    knowledge::increment_error_count(&store.db, error_id).unwrap();
    assert_index_consistent(&store.db);
    knowledge::add_session(
        &store.db,
        &NewSession {
            date: "2025-06-01".into(),
            project_name: Some("hindsight".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_index_consistent(&store.db);
    knowledge::delete_entry(&store.db, IndexedKind::Lesson, lesson_id).unwrap();
    assert_index_consistent(&store.db);
}

#[test]
fn delete_removes_row_links_and_posting_but_keeps_tags() {
    let store = test_store();
    let id = knowledge::add_lesson(&store.db, &lesson("Doomed", "entry", &["keep-me"])).unwrap();
    let other =
        knowledge::add_lesson(&store.db, &lesson("Survivor", "entry", &["keep-me"])).unwrap();

    knowledge::delete_entry(&store.db, IndexedKind::Lesson, id).unwrap();

    let snap = snapshot(&store.db);
    assert_eq!(snap.lessons, 1);
    assert_eq!(snap.lesson_postings, 1);
    assert_eq!(snap.links, 1);
    assert_eq!(snap.tags, 1);
    assert_eq!(find(&store.db, SearchKind::Lesson, "entry"), vec![other]);
    assert!(matches!(
        knowledge::delete_entry(&store.db, IndexedKind::Lesson, id),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn deleting_one_kind_leaves_same_id_of_other_kind() {
    let store = test_store();
    let lesson_id = knowledge::add_lesson(&store.db, &lesson("l", "shared words", &["t"])).unwrap();
    let error_id =
        knowledge::add_error_record(&store.db, &error_record("c", "shared words", &["t"]))
            .unwrap();
    assert_eq!(lesson_id, error_id);

    knowledge::delete_entry(&store.db, IndexedKind::ErrorRecord, error_id).unwrap();

    assert_eq!(find(&store.db, SearchKind::Lesson, "shared"), vec![lesson_id]);
    assert_eq!(snapshot(&store.db).links, 1);
    assert_index_consistent(&store.db);
}
