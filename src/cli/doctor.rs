//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use hindsight::config::HindsightConfig;
use hindsight::db::{self, ConnectionManager};
use hindsight::knowledge::index::check_index;
use hindsight::knowledge::IndexedKind;

/// Run integrity and index-drift checks and print a health report.
pub fn doctor(config: &HindsightConfig) -> Result<()> {
    let db_path = config.storage.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `hindsight serve` or add an entry to initialize it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let manager = ConnectionManager::open(&config.storage)
        .context("failed to open database (may be corrupt)")?;

    let (report, drift) = manager
        .with_snapshot(|tx| {
            let report = db::check_database_health(tx)?;
            let drift = IndexedKind::ALL
                .iter()
                .map(|kind| check_index(tx, *kind))
                .collect::<hindsight::error::Result<Vec<_>>>()?;
            Ok((report, drift))
        })
        .context("failed to run health check")?;

    println!("Hindsight Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Row counts:");
    println!("  Lessons:         {}", report.lesson_count);
    println!("  Errors:          {}", report.error_count);
    println!("  Patterns:        {}", report.pattern_count);
    println!("  Sessions:        {}", report.session_count);
    println!("  Tags:            {}", report.tag_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }
    println!();
    println!("Text index:");
    let mut drifted = false;
    for d in &drift {
        if d.is_clean() {
            println!("  {:<10} OK ({} rows, {} postings)", d.kind.to_string(), d.rows, d.postings);
        } else {
            drifted = true;
            println!(
                "  {:<10} DRIFT ({} orphaned, {} missing, {} stale)",
                d.kind.to_string(),
                d.orphaned.len(),
                d.missing.len(),
                d.stale.len()
            );
        }
    }

    if drifted {
        println!();
        println!("Repair with: hindsight rebuild-index");
    }
    if !report.integrity_ok {
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db ~/.hindsight/knowledge.db");
        println!("  2. Or export what is still readable: hindsight export > backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
