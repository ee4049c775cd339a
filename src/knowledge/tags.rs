//! Tag vocabulary and the links between tags and indexed entries.
//!
//! Tags are created on first use and never deleted by the write path. A link row
//! `(entity_kind, entity_id, tag_id)` exists at most once; the kind column is part of
//! the key because lessons, errors and patterns each have their own id sequence.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::knowledge::types::{normalize_tag_names, now_timestamp, EntityId, IndexedKind, TagUsage};

/// Resolve tag names to ids, creating the tags that do not exist yet.
///
/// Names are trimmed and deduplicated; an empty name fails validation.
pub fn ensure_tags(conn: &Connection, names: &[String]) -> Result<BTreeSet<i64>> {
    let names = normalize_tag_names(names)?;
    let mut ids = BTreeSet::new();
    if names.is_empty() {
        return Ok(ids);
    }

    let now = now_timestamp();
    let mut insert = conn.prepare_cached(
        "INSERT INTO tags (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
    )?;
    let mut lookup = conn.prepare_cached("SELECT id FROM tags WHERE name = ?1")?;

    for name in &names {
        insert.execute(params![name, now])?;
        let id: i64 = lookup.query_row(params![name], |row| row.get(0))?;
        ids.insert(id);
    }

    Ok(ids)
}

/// Make the entry's links exactly `tag_ids`.
pub fn replace_links(
    conn: &Connection,
    kind: IndexedKind,
    entity_id: EntityId,
    tag_ids: &BTreeSet<i64>,
) -> Result<()> {
    remove_links(conn, kind, entity_id)?;

    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO entity_tags (entity_kind, entity_id, tag_id) VALUES (?1, ?2, ?3)",
    )?;
    for tag_id in tag_ids {
        stmt.execute(params![kind.as_str(), entity_id, tag_id])?;
    }
    Ok(())
}

/// Drop every link of the entry. Returns how many were removed.
pub fn remove_links(conn: &Connection, kind: IndexedKind, entity_id: EntityId) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM entity_tags WHERE entity_kind = ?1 AND entity_id = ?2",
        params![kind.as_str(), entity_id],
    )?;
    Ok(removed)
}

/// Tag names linked to the entry, alphabetically.
pub fn tags_for(conn: &Connection, kind: IndexedKind, entity_id: EntityId) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM entity_tags et \
         JOIN tags t ON t.id = et.tag_id \
         WHERE et.entity_kind = ?1 AND et.entity_id = ?2 \
         ORDER BY t.name",
    )?;
    let names = stmt
        .query_map(params![kind.as_str(), entity_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Look up a tag id by exact name.
pub fn find_tag(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", params![name.trim()], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(id)
}

/// Every tag with the number of entries linked to it, most used first.
pub fn list_tags(conn: &Connection) -> Result<Vec<TagUsage>> {
    let mut stmt = conn.prepare(
        "SELECT t.name, COUNT(et.tag_id) AS usage \
         FROM tags t LEFT JOIN entity_tags et ON et.tag_id = t.id \
         GROUP BY t.id \
         ORDER BY usage DESC, t.name ASC",
    )?;
    let tags = stmt
        .query_map([], |row| {
            Ok(TagUsage {
                name: row.get(0)?,
                usage_count: row.get::<_, i64>(1)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}
