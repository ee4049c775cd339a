use anyhow::Result;

use hindsight::config::HindsightConfig;
use hindsight::db::ConnectionManager;
use hindsight::knowledge::stats;

/// Display knowledge base statistics in the terminal.
pub fn stats(config: &HindsightConfig) -> Result<()> {
    let db = ConnectionManager::open(&config.storage)?;
    let path = db.path().to_path_buf();
    let response = db.with_snapshot(|tx| stats::statistics(tx, Some(&path)))?;

    println!("Knowledge Statistics");
    println!("{}", "=".repeat(40));
    println!("  Lessons:             {}", response.total_lessons);
    println!("  Errors:              {}", response.total_errors);
    println!("  Error occurrences:   {}", response.total_error_occurrences);
    println!("  Patterns:            {}", response.total_patterns);
    println!("  Sessions:            {}", response.total_sessions);
    println!("  Tags:                {}", response.total_tags);
    println!();

    println!("Lessons by category:");
    for c in &["pattern", "practice", "gotcha", "decision"] {
        let count = response.lessons_by_category.get(*c).copied().unwrap_or(0);
        println!("  {:<12} {}", c, count);
    }
    println!();

    if !response.top_technologies.is_empty() {
        println!("Top technologies:");
        for t in &response.top_technologies {
            println!("  {:<12} {}", t.technology, t.count);
        }
        println!();
    }

    if !response.most_common_errors.is_empty() {
        println!("Most frequent errors:");
        for e in &response.most_common_errors {
            println!("  x{:<4} [{}] {}", e.occurrence_count, e.technology, e.error_pattern);
        }
        println!();
    }

    println!("Database size:         {} bytes", response.db_size_bytes);

    Ok(())
}
