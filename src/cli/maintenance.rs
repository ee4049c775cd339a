//! CLI maintenance commands: index rebuild and hard delete.

use anyhow::{Context, Result};

use hindsight::config::HindsightConfig;
use hindsight::db::ConnectionManager;
use hindsight::knowledge::index::rebuild_index;
use hindsight::knowledge::{delete_entry, EntityId, IndexedKind};

/// Rebuild the text index for one kind, or all of them.
pub fn rebuild(config: &HindsightConfig, kind: Option<IndexedKind>) -> Result<()> {
    let db = ConnectionManager::open(&config.storage)?;
    let kinds = match kind {
        Some(k) => vec![k],
        None => IndexedKind::ALL.to_vec(),
    };

    for kind in kinds {
        let written = rebuild_index(&db, kind)
            .with_context(|| format!("failed to rebuild {kind} index"))?;
        println!("  {:<10} {} postings", kind.to_string(), written);
    }
    println!("Index rebuild complete.");
    Ok(())
}

/// Permanently delete one entry with its tag links and index posting.
pub fn delete(config: &HindsightConfig, kind: IndexedKind, id: EntityId) -> Result<()> {
    let db = ConnectionManager::open(&config.storage)?;
    delete_entry(&db, kind, id).with_context(|| format!("failed to delete {kind} {id}"))?;
    println!("Deleted {kind} {id}.");
    Ok(())
}
