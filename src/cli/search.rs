use anyhow::Result;

use hindsight::config::HindsightConfig;
use hindsight::db::ConnectionManager;
use hindsight::knowledge::search::KnowledgeEntry;
use hindsight::knowledge::{SearchConfig, SearchRequest};

/// Run a search from the terminal and print a short line per hit.
pub fn search(config: &HindsightConfig, request: &SearchRequest) -> Result<()> {
    let db = ConnectionManager::open(&config.storage)?;
    let response = hindsight::knowledge::search(&db, request, &SearchConfig::from(&config.search))?;

    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", response.count);

    for (i, hit) in response.results.iter().enumerate() {
        let (title, detail) = match &hit.entry {
            KnowledgeEntry::Lesson(l) => (l.title.as_str(), l.content.as_str()),
            KnowledgeEntry::ErrorRecord(e) => (e.error_pattern.as_str(), e.solution.as_str()),
            KnowledgeEntry::Pattern(p) => (p.pattern_name.as_str(), p.description.as_str()),
        };
        println!(
            "  {}. [{} #{}] {} (score: {:.4})",
            i + 1,
            hit.kind,
            hit.id,
            title,
            hit.score
        );
        println!("     {}", truncate_preview(detail, 120));
    }

    Ok(())
}

fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
