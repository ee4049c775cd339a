use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hindsight::knowledge::types::LessonCategory;
use hindsight::knowledge::{SearchFilters, SearchKind, SearchRequest};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryKnowledgeParams {
    #[schemars(description = "Search terms to find relevant knowledge. Empty browses newest entries.")]
    pub query: String,

    #[schemars(description = "Which entries to search: 'lesson', 'error', 'pattern' or 'all' (default)")]
    pub category: Option<String>,

    #[schemars(description = "Filter by technology (e.g. swift, xcode, rust)")]
    pub technology: Option<String>,

    #[schemars(description = "Lesson category filter: pattern, practice, gotcha or decision")]
    pub lesson_category: Option<String>,

    #[schemars(description = "Only entries carrying all of these tags")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Maximum number of results (default 10, max 100)")]
    pub limit: Option<usize>,
}

impl QueryKnowledgeParams {
    pub fn into_request(self) -> Result<SearchRequest, String> {
        let kind = match self.category.as_deref() {
            None => SearchKind::All,
            Some(s) => s.parse()?,
        };
        let category = self
            .lesson_category
            .as_deref()
            .map(LessonCategory::parse)
            .transpose()
            .map_err(|e| e.to_string())?;
        Ok(SearchRequest {
            kind,
            text: self.query,
            filters: SearchFilters {
                technology: self.technology,
                category,
                tags: self.tags.unwrap_or_default(),
                ..Default::default()
            },
            limit: self.limit,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchErrorsParams {
    #[schemars(description = "Error message or description to search for")]
    pub error_message: String,

    #[schemars(description = "Filter by technology (e.g. swift, xcode, python)")]
    pub technology: Option<String>,

    #[schemars(description = "Maximum number of results (default 10, max 100)")]
    pub limit: Option<usize>,
}

impl From<SearchErrorsParams> for SearchRequest {
    fn from(params: SearchErrorsParams) -> Self {
        SearchRequest {
            kind: SearchKind::ErrorRecord,
            text: params.error_message,
            filters: SearchFilters {
                technology: params.technology,
                ..Default::default()
            },
            limit: params.limit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetPatternsParams {
    #[schemars(description = "Pattern name or description to search for. Empty lists newest patterns.")]
    pub query: Option<String>,

    #[schemars(description = "Only patterns available on this platform version (e.g. '17.0')")]
    pub platform_version: Option<String>,

    #[schemars(description = "Only patterns available for this language version (e.g. '5.9')")]
    pub language_version: Option<String>,

    #[schemars(description = "Only patterns carrying all of these tags")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Maximum number of results (default 10, max 100)")]
    pub limit: Option<usize>,
}

impl From<GetPatternsParams> for SearchRequest {
    fn from(params: GetPatternsParams) -> Self {
        SearchRequest {
            kind: SearchKind::Pattern,
            text: params.query.unwrap_or_default(),
            filters: SearchFilters {
                tags: params.tags.unwrap_or_default(),
                platform_version: params.platform_version,
                language_version: params.language_version,
                ..Default::default()
            },
            limit: params.limit,
        }
    }
}
