use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hindsight::knowledge::types::{LessonUpdate, NewErrorRecord, NewLesson, NewPattern, NewSession};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddLessonParams {
    #[schemars(description = "Brief title for the lesson")]
    pub title: String,

    #[schemars(description = "Detailed description of the lesson or learning")]
    pub content: String,

    #[schemars(
        description = "Category: pattern (code pattern), practice (best practice), gotcha (common pitfall), decision (architectural decision)"
    )]
    pub category: String,

    #[schemars(description = "Technology this applies to (e.g. swift, xcode, rust)")]
    pub technology: Option<String>,

    #[schemars(description = "Tags for categorization")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Optional project this lesson came from")]
    pub project_context: Option<String>,

    #[schemars(description = "Optional session id or log path where this was learned")]
    pub source_session: Option<String>,
}

impl From<AddLessonParams> for NewLesson {
    fn from(p: AddLessonParams) -> Self {
        NewLesson {
            title: p.title,
            content: p.content,
            category: p.category,
            technology: p.technology,
            tags: p.tags.unwrap_or_default(),
            project_context: p.project_context,
            source_session: p.source_session,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateLessonParams {
    #[schemars(description = "Lesson ID to update")]
    pub id: i64,

    #[schemars(description = "New title")]
    pub title: Option<String>,

    #[schemars(description = "New content")]
    pub content: Option<String>,

    #[schemars(description = "New category: pattern, practice, gotcha or decision")]
    pub category: Option<String>,

    #[schemars(description = "New technology; empty string clears it")]
    pub technology: Option<String>,

    #[schemars(description = "New tags; replaces the existing set")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "New project context; empty string clears it")]
    pub project_context: Option<String>,
}

impl UpdateLessonParams {
    pub fn into_update(self) -> (i64, LessonUpdate) {
        (
            self.id,
            LessonUpdate {
                title: self.title,
                content: self.content,
                category: self.category,
                technology: self.technology,
                project_context: self.project_context,
                source_session: None,
                tags: self.tags,
            },
        )
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddCommonErrorParams {
    #[schemars(description = "Technology this error applies to (e.g. swift, xcode, python)")]
    pub technology: String,

    #[schemars(description = "The error message or pattern to match")]
    pub error_pattern: String,

    #[schemars(description = "How to fix this error")]
    pub solution: String,

    #[schemars(description = "What causes this error")]
    pub root_cause: Option<String>,

    #[schemars(description = "Code example showing the fix")]
    pub code_example: Option<String>,

    #[schemars(description = "Tags for categorization")]
    pub tags: Option<Vec<String>>,
}

impl From<AddCommonErrorParams> for NewErrorRecord {
    fn from(p: AddCommonErrorParams) -> Self {
        NewErrorRecord {
            technology: p.technology,
            error_pattern: p.error_pattern,
            solution: p.solution,
            root_cause: p.root_cause,
            code_example: p.code_example,
            tags: p.tags.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IncrementErrorCountParams {
    #[schemars(description = "Error ID whose occurrence count should go up by one")]
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddPatternParams {
    #[schemars(description = "Name of the pattern")]
    pub pattern_name: String,

    #[schemars(description = "What this pattern does")]
    pub description: String,

    #[schemars(description = "Code example demonstrating the pattern")]
    pub code_example: String,

    #[schemars(description = "When to use this pattern")]
    pub when_to_use: Option<String>,

    #[schemars(description = "When NOT to use this pattern")]
    pub when_not_to_use: Option<String>,

    #[schemars(description = "Related API names")]
    pub related_apis: Option<Vec<String>>,

    #[schemars(description = "Minimum platform version required (e.g. '17.0')")]
    pub platform_version: Option<String>,

    #[schemars(description = "Minimum language version required (e.g. '5.9')")]
    pub language_version: Option<String>,

    #[schemars(description = "Tags for categorization")]
    pub tags: Option<Vec<String>>,
}

impl From<AddPatternParams> for NewPattern {
    fn from(p: AddPatternParams) -> Self {
        NewPattern {
            pattern_name: p.pattern_name,
            description: p.description,
            code_example: p.code_example,
            when_to_use: p.when_to_use,
            when_not_to_use: p.when_not_to_use,
            related_apis: p.related_apis.unwrap_or_default(),
            platform_version: p.platform_version,
            language_version: p.language_version,
            tags: p.tags.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddSessionContextParams {
    #[schemars(description = "Session date in YYYY-MM-DD format")]
    pub date: String,

    #[schemars(description = "Name of the project")]
    pub project_name: Option<String>,

    #[schemars(description = "Path to the session log file")]
    pub log_reference: Option<String>,

    #[schemars(description = "Brief summary of what was accomplished")]
    pub summary: Option<String>,
}

impl From<AddSessionContextParams> for NewSession {
    fn from(p: AddSessionContextParams) -> Self {
        NewSession {
            date: p.date,
            project_name: p.project_name,
            log_reference: p.log_reference,
            summary: p.summary,
        }
    }
}
