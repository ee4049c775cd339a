mod helpers;

use helpers::{assert_index_consistent, error_record, lesson, pattern, snapshot, test_store};
use hindsight::error::StoreError;
use hindsight::knowledge::store::{
    add_error_record_composite, add_lesson_composite, add_pattern_composite,
    delete_entry_composite, update_lesson_composite,
};
use hindsight::knowledge::transaction::{run_atomic, Composite};
use hindsight::knowledge::types::LessonUpdate;
use hindsight::knowledge::{self, IndexedKind};

/// Insert a failing step at every position of the composite built by `build` and check
/// that each run leaves the store exactly as it was.
fn assert_all_or_nothing<'a>(
    store: &helpers::TestStore,
    mut build: impl FnMut() -> Composite<'a>,
) {
    let steps = build().len();
    assert!(steps > 0);

    for k in 0..=steps {
        let before = snapshot(&store.db);
        let mut composite = build();
        composite.insert_step(k, "injected failure", |_, _| {
            Err(StoreError::ValidationFailed {
                field: "injected",
                message: "boom".into(),
            })
        });

        let err = run_atomic(&store.db, &mut composite).unwrap_err();
        assert!(
            matches!(err, StoreError::ValidationFailed { field: "injected", .. }),
            "step {k}: unexpected error {err:?}"
        );
        assert_eq!(snapshot(&store.db), before, "state changed with failure at step {k}");
        assert_index_consistent(&store.db);
    }

    // without injection the same composite commits
    let mut composite = build();
    run_atomic(&store.db, &mut composite).unwrap();
    assert_index_consistent(&store.db);
}

#[test]
fn add_lesson_is_all_or_nothing() {
    let store = test_store();
    let input = lesson("Atomic lesson", "never half written", &["new-tag", "other"]);
    assert_all_or_nothing(&store, || add_lesson_composite(&input).unwrap());
    assert_eq!(snapshot(&store.db).lessons, 1);
}

#[test]
fn add_error_record_is_all_or_nothing() {
    let store = test_store();
    let input = error_record("swift", "Sendable closure captures", &["concurrency"]);
    assert_all_or_nothing(&store, || add_error_record_composite(&input).unwrap());
    assert_eq!(snapshot(&store.db).errors, 1);
}

#[test]
fn add_pattern_is_all_or_nothing() {
    let store = test_store();
    let input = pattern("Actor-Based Cache", "Serialize cache access", &["caching"]);
    assert_all_or_nothing(&store, || add_pattern_composite(&input).unwrap());
    assert_eq!(snapshot(&store.db).patterns, 1);
}

#[test]
fn update_lesson_is_all_or_nothing() {
    let store = test_store();
    let id = knowledge::add_lesson(&store.db, &lesson("Before", "text", &["old"])).unwrap();
    let update = LessonUpdate {
        title: Some("After".into()),
        tags: Some(vec!["new".into()]),
        ..Default::default()
    };
    assert_all_or_nothing(&store, || update_lesson_composite(id, &update).unwrap());

    let stored = store
        .db
        .with_connection(|conn| knowledge::entities::get_lesson(conn, id))
        .unwrap();
    assert_eq!(stored.title, "After");
    assert_eq!(stored.tags, vec!["new"]);
}

#[test]
fn delete_entry_is_all_or_nothing() {
    let store = test_store();
    let id = knowledge::add_lesson(&store.db, &lesson("Delete me", "text", &["t"])).unwrap();
    assert_all_or_nothing(&store, || delete_entry_composite(IndexedKind::Lesson, id));
    assert_eq!(snapshot(&store.db).lessons, 0);
}

#[test]
fn business_failure_inside_composite_is_not_retried() {
    let store = test_store();
    let calls = std::cell::Cell::new(0);
    let mut composite = Composite::new("CountsCalls").step("fail", |_, _| {
        calls.set(calls.get() + 1);
        Err(StoreError::ValidationFailed {
            field: "title",
            message: "nope".into(),
        })
    });
    assert!(run_atomic(&store.db, &mut composite).is_err());
    assert_eq!(calls.get(), 1);
}
