//! Write path: every mutation of the store as an atomic composite.
//!
//! Each public operation validates its input before touching storage, builds a
//! [`Composite`] from the row, tag and index primitives, and runs it with
//! [`run_atomic`]. The `*_composite` builders are public so callers can inspect or
//! extend the step list (tests inject failures at every position this way).

use tracing::info;

use crate::db::ConnectionManager;
use crate::error::{Result, StoreError};
use crate::knowledge::transaction::{run_atomic, Composite};
use crate::knowledge::types::{
    EntityId, ErrorRecordUpdate, IndexedKind, LessonUpdate, NewErrorRecord, NewLesson, NewPattern,
    NewSession, PatternUpdate,
};
use crate::knowledge::{entities, index, tags};

/// Insert lesson, resolve tags, link them, index the lesson.
pub fn add_lesson_composite(input: &NewLesson) -> Result<Composite<'_>> {
    let category = input.validate()?;
    Ok(Composite::new("AddLesson")
        .step("insert lesson", move |tx, ctx| {
            ctx.entity_id = Some(entities::insert_lesson(tx, input, category)?);
            Ok(())
        })
        .step("ensure tags", move |tx, ctx| {
            ctx.tag_ids = tags::ensure_tags(tx, &input.tags)?;
            Ok(())
        })
        .step("link tags", |tx, ctx| {
            let id = ctx.entity_id("link tags")?;
            tags::replace_links(tx, IndexedKind::Lesson, id, &ctx.tag_ids)
        })
        .step("index lesson", |tx, ctx| {
            index::add_posting(tx, IndexedKind::Lesson, ctx.entity_id("index lesson")?)
        }))
}

pub fn add_lesson(db: &ConnectionManager, input: &NewLesson) -> Result<EntityId> {
    let mut composite = add_lesson_composite(input)?;
    let id = run_atomic(db, &mut composite)?.entity_id("add lesson")?;
    info!(id, title = %input.title, "lesson added");
    Ok(id)
}

/// Update fields, replace tags when given, re-index when searchable text changed.
pub fn update_lesson_composite(id: EntityId, update: &LessonUpdate) -> Result<Composite<'_>> {
    let category = update.validate()?;
    let mut composite = Composite::for_entity("UpdateLesson", id)
        .step("update lesson", move |tx, _| entities::update_lesson(tx, id, update, category));
    if let Some(names) = &update.tags {
        composite = with_tag_steps(composite, IndexedKind::Lesson, names);
    }
    if update.touches_index() {
        composite = composite.step("reindex lesson", move |tx, _| {
            index::replace_posting(tx, IndexedKind::Lesson, id)
        });
    }
    Ok(composite)
}

pub fn update_lesson(db: &ConnectionManager, id: EntityId, update: &LessonUpdate) -> Result<()> {
    let mut composite = update_lesson_composite(id, update)?;
    run_atomic(db, &mut composite)?;
    info!(id, reindexed = update.touches_index(), "lesson updated");
    Ok(())
}

pub fn add_error_record_composite(input: &NewErrorRecord) -> Result<Composite<'_>> {
    input.validate()?;
    let mut composite = Composite::new("AddErrorRecord").step("insert error", move |tx, ctx| {
        ctx.entity_id = Some(entities::insert_error_record(tx, input)?);
        Ok(())
    });
    if !input.tags.is_empty() {
        composite = with_tag_steps(composite, IndexedKind::ErrorRecord, &input.tags);
    }
    Ok(composite.step("index error", |tx, ctx| {
        index::add_posting(tx, IndexedKind::ErrorRecord, ctx.entity_id("index error")?)
    }))
}

/// Record a new error with its fix. The occurrence count starts at 1.
pub fn add_error_record(db: &ConnectionManager, input: &NewErrorRecord) -> Result<EntityId> {
    let mut composite = add_error_record_composite(input)?;
    let id = run_atomic(db, &mut composite)?.entity_id("add error")?;
    info!(id, technology = %input.technology, "error record added");
    Ok(id)
}

pub fn update_error_record_composite(
    id: EntityId,
    update: &ErrorRecordUpdate,
) -> Result<Composite<'_>> {
    update.validate()?;
    let mut composite = Composite::for_entity("UpdateErrorRecord", id)
        .step("update error", move |tx, _| entities::update_error_record(tx, id, update));
    if let Some(names) = &update.tags {
        composite = with_tag_steps(composite, IndexedKind::ErrorRecord, names);
    }
    if update.touches_index() {
        composite = composite.step("reindex error", move |tx, _| {
            index::replace_posting(tx, IndexedKind::ErrorRecord, id)
        });
    }
    Ok(composite)
}

pub fn update_error_record(
    db: &ConnectionManager,
    id: EntityId,
    update: &ErrorRecordUpdate,
) -> Result<()> {
    let mut composite = update_error_record_composite(id, update)?;
    run_atomic(db, &mut composite)?;
    info!(id, reindexed = update.touches_index(), "error record updated");
    Ok(())
}

/// Bump the occurrence count by one. The index is untouched.
pub fn increment_error_count(db: &ConnectionManager, id: EntityId) -> Result<u32> {
    let mut occurrences = None;
    let mut composite = Composite::for_entity("IncrementErrorCount", id).step("increment", |tx, _| {
        occurrences = Some(entities::increment_occurrences(tx, id)?);
        Ok(())
    });
    run_atomic(db, &mut composite)?;
    drop(composite);
    let count = occurrences.ok_or(StoreError::StepOrder("increment"))?;
    info!(id, occurrences = count, "error occurrence recorded");
    Ok(count)
}

pub fn add_pattern_composite(input: &NewPattern) -> Result<Composite<'_>> {
    input.validate()?;
    let mut composite = Composite::new("AddPattern").step("insert pattern", move |tx, ctx| {
        ctx.entity_id = Some(entities::insert_pattern(tx, input)?);
        Ok(())
    });
    if !input.tags.is_empty() {
        composite = with_tag_steps(composite, IndexedKind::Pattern, &input.tags);
    }
    Ok(composite.step("index pattern", |tx, ctx| {
        index::add_posting(tx, IndexedKind::Pattern, ctx.entity_id("index pattern")?)
    }))
}

pub fn add_pattern(db: &ConnectionManager, input: &NewPattern) -> Result<EntityId> {
    let mut composite = add_pattern_composite(input)?;
    let id = run_atomic(db, &mut composite)?.entity_id("add pattern")?;
    info!(id, name = %input.pattern_name, "pattern added");
    Ok(id)
}

pub fn update_pattern_composite(id: EntityId, update: &PatternUpdate) -> Result<Composite<'_>> {
    update.validate()?;
    let mut composite = Composite::for_entity("UpdatePattern", id)
        .step("update pattern", move |tx, _| entities::update_pattern(tx, id, update));
    if let Some(names) = &update.tags {
        composite = with_tag_steps(composite, IndexedKind::Pattern, names);
    }
    if update.touches_index() {
        composite = composite.step("reindex pattern", move |tx, _| {
            index::replace_posting(tx, IndexedKind::Pattern, id)
        });
    }
    Ok(composite)
}

pub fn update_pattern(db: &ConnectionManager, id: EntityId, update: &PatternUpdate) -> Result<()> {
    let mut composite = update_pattern_composite(id, update)?;
    run_atomic(db, &mut composite)?;
    info!(id, reindexed = update.touches_index(), "pattern updated");
    Ok(())
}

/// Sessions carry no tags and no index, so this is a single-step composite.
pub fn add_session(db: &ConnectionManager, input: &NewSession) -> Result<EntityId> {
    input.validate()?;
    let mut composite = Composite::new("AddSession").step("insert session", |tx, ctx| {
        ctx.entity_id = Some(entities::insert_session(tx, input)?);
        Ok(())
    });
    let id = run_atomic(db, &mut composite)?.entity_id("add session")?;
    info!(id, date = %input.date, "session recorded");
    Ok(id)
}

pub fn delete_entry_composite(kind: IndexedKind, id: EntityId) -> Composite<'static> {
    Composite::for_entity("DeleteEntry", id)
        .step("check exists", move |tx, _| entities::ensure_exists(tx, kind, id))
        .step("unlink tags", move |tx, _| {
            tags::remove_links(tx, kind, id)?;
            Ok(())
        })
        .step("remove posting", move |tx, _| {
            index::remove_posting(tx, kind, id)?;
            Ok(())
        })
        .step("delete row", move |tx, _| entities::delete_row(tx, kind, id))
}

/// Hard-delete an entry together with its links and posting. Tags stay.
pub fn delete_entry(db: &ConnectionManager, kind: IndexedKind, id: EntityId) -> Result<()> {
    let mut composite = delete_entry_composite(kind, id);
    run_atomic(db, &mut composite)?;
    info!(kind = %kind, id, "entry deleted");
    Ok(())
}

/// Append `ensure tags` and `link tags` for an entry whose id is in the context.
fn with_tag_steps<'a>(
    composite: Composite<'a>,
    kind: IndexedKind,
    names: &'a [String],
) -> Composite<'a> {
    composite
        .step("ensure tags", move |tx, ctx| {
            ctx.tag_ids = tags::ensure_tags(tx, names)?;
            Ok(())
        })
        .step("link tags", move |tx, ctx| {
            let id = ctx.entity_id("link tags")?;
            tags::replace_links(tx, kind, id, &ctx.tag_ids)
        })
}
