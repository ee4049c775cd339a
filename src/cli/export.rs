use anyhow::Result;

use hindsight::config::HindsightConfig;
use hindsight::db::ConnectionManager;
use hindsight::knowledge::export::{export_knowledge, ExportRequest};

/// Export knowledge as JSON to stdout.
pub fn export(config: &HindsightConfig, request: &ExportRequest) -> Result<()> {
    let db = ConnectionManager::open(&config.storage)?;
    let data = db.with_snapshot(|tx| export_knowledge(tx, request))?;

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} entries{}.",
        data.entry_count(),
        data.sessions
            .as_ref()
            .map(|s| format!(" and {} sessions", s.len()))
            .unwrap_or_default()
    );

    Ok(())
}
