//! Hindsight: a local knowledge base of lessons learned, common errors and code
//! patterns, searchable with full-text ranking and served to AI agents over MCP.
//!
//! Everything lives in one SQLite file. Entries come in three indexed kinds plus
//! sessions:
//!
//! | Kind | Holds | Indexed text |
//! |------|-------|--------------|
//! | **Lesson** | A learning with a category (pattern, practice, gotcha, decision) | title, content, technology |
//! | **Error** | An error message, its cause and fix, and how often it was seen | technology, pattern, root cause, solution |
//! | **Pattern** | A reusable code pattern with minimum platform/language versions | name, description, example, when to use, related APIs |
//! | **Session** | Date, project and log reference of a work session | not indexed |
//!
//! # Architecture
//!
//! - **Storage**: SQLite in WAL mode, one short-lived connection per call, retried with
//!   exponential backoff while another writer holds the lock
//! - **Writes**: every mutation is a composite of steps (row, tags, index posting)
//!   committed in one `BEGIN IMMEDIATE` transaction
//! - **Search**: FTS5 with the porter tokenizer, ranked by BM25, filtered by
//!   technology, category, tags and version constraints
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: Connection management, schema and health checks
//! - [`error`]: The [`error::StoreError`] taxonomy
//! - [`knowledge`]: Entities, tags, index sync, composites, search and reporting

pub mod config;
pub mod db;
pub mod error;
pub mod knowledge;
