mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hindsight::config::HindsightConfig;
use hindsight::knowledge::export::ExportRequest;
use hindsight::knowledge::types::LessonCategory;
use hindsight::knowledge::{EntityId, IndexedKind, SearchFilters, SearchKind, SearchRequest};

#[derive(Parser)]
#[command(
    name = "hindsight",
    version,
    about = "Local knowledge base of lessons, errors and patterns, served over MCP"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (transport from config: stdio or http)
    Serve,
    /// Search the knowledge base
    Search {
        /// Free-text query; empty lists the newest entries
        #[arg(default_value = "")]
        query: String,
        /// all, lesson, error or pattern
        #[arg(long, default_value = "all")]
        kind: SearchKind,
        #[arg(long)]
        technology: Option<String>,
        /// Lesson category: pattern, practice, gotcha or decision
        #[arg(long)]
        category: Option<LessonCategory>,
        /// Require this tag (repeatable; all must match)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show knowledge base statistics
    Stats,
    /// Export knowledge as JSON to stdout
    Export {
        #[arg(long, default_value = "all")]
        kind: SearchKind,
        #[arg(long)]
        technology: Option<String>,
        #[arg(long)]
        include_sessions: bool,
    },
    /// Check database integrity and text index drift
    Doctor,
    /// Rebuild the text index from the primary tables
    RebuildIndex {
        /// lesson, error or pattern; all kinds when omitted
        kind: Option<IndexedKind>,
    },
    /// Permanently delete an entry
    Delete {
        /// lesson, error or pattern
        kind: IndexedKind,
        id: EntityId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = HindsightConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve(config).await?;
        }
        Command::Search {
            query,
            kind,
            technology,
            category,
            tags,
            limit,
        } => {
            let request = SearchRequest {
                kind,
                text: query,
                filters: SearchFilters {
                    technology,
                    category,
                    tags,
                    ..Default::default()
                },
                limit,
            };
            cli::search::search(&config, &request)?;
        }
        Command::Stats => cli::stats::stats(&config)?,
        Command::Export {
            kind,
            technology,
            include_sessions,
        } => {
            let request = ExportRequest {
                kind,
                technology,
                include_sessions,
            };
            cli::export::export(&config, &request)?;
        }
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::RebuildIndex { kind } => cli::maintenance::rebuild(&config, kind)?,
        Command::Delete { kind, id } => cli::maintenance::delete(&config, kind, id)?,
    }

    Ok(())
}
