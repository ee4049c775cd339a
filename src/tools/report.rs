use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hindsight::knowledge::export::ExportRequest;
use hindsight::knowledge::SearchKind;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExportKnowledgeParams {
    #[schemars(description = "Which entries to export: 'lesson', 'error', 'pattern' or 'all' (default)")]
    pub category: Option<String>,

    #[schemars(description = "Only lessons and errors for this technology")]
    pub technology: Option<String>,

    #[schemars(description = "Include session records (default false)")]
    pub include_sessions: Option<bool>,
}

impl ExportKnowledgeParams {
    pub fn into_request(self) -> Result<ExportRequest, String> {
        let kind = match self.category.as_deref() {
            None => SearchKind::All,
            Some(s) => s.parse::<SearchKind>()?,
        };
        Ok(ExportRequest {
            kind,
            technology: self.technology,
            include_sessions: self.include_sessions.unwrap_or(false),
        })
    }
}
