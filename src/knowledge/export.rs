use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::knowledge::entities::{self, ListFilter};
use crate::knowledge::search::SearchKind;
use crate::knowledge::types::{ErrorRecord, Lesson, Pattern, Session};

/// Version of the export document layout.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub kind: SearchKind,
    /// Applies to lessons and errors. Patterns carry no technology and are exported whole.
    pub technology: Option<String>,
    #[serde(default)]
    pub include_sessions: bool,
}

/// Export document. Sections not requested are left out.
#[derive(Debug, Serialize)]
pub struct ExportData {
    pub exported_at: String,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lessons: Option<Vec<Lesson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<Pattern>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
}

impl ExportData {
    pub fn entry_count(&self) -> usize {
        self.lessons.as_ref().map_or(0, Vec::len)
            + self.errors.as_ref().map_or(0, Vec::len)
            + self.patterns.as_ref().map_or(0, Vec::len)
    }
}

/// Collect every requested entry, tags included.
pub fn export_knowledge(conn: &Connection, request: &ExportRequest) -> Result<ExportData> {
    let filter = ListFilter {
        technology: request.technology.clone(),
        ..Default::default()
    };
    let wants = |kind: SearchKind| request.kind == SearchKind::All || request.kind == kind;

    let lessons = if wants(SearchKind::Lesson) {
        Some(entities::list_lessons(conn, &filter)?)
    } else {
        None
    };
    let errors = if wants(SearchKind::ErrorRecord) {
        Some(entities::list_error_records(conn, &filter)?)
    } else {
        None
    };
    let patterns = if wants(SearchKind::Pattern) {
        Some(entities::list_patterns(conn, &ListFilter::default())?)
    } else {
        None
    };
    let sessions = if request.include_sessions {
        Some(entities::list_sessions(conn, &ListFilter::default())?)
    } else {
        None
    };

    Ok(ExportData {
        exported_at: chrono::Utc::now().to_rfc3339(),
        version: EXPORT_FORMAT_VERSION,
        lessons,
        errors,
        patterns,
        sessions,
    })
}
