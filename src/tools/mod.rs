pub mod report;
pub mod search;
pub mod write;

use report::ExportKnowledgeParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search::{GetPatternsParams, QueryKnowledgeParams, SearchErrorsParams};
use serde::Serialize;
use std::sync::Arc;
use write::{
    AddCommonErrorParams, AddLessonParams, AddPatternParams, AddSessionContextParams,
    IncrementErrorCountParams, UpdateLessonParams,
};

use hindsight::db::ConnectionManager;
use hindsight::error::StoreError;
use hindsight::knowledge::{self, export, stats, tags, SearchConfig, SearchRequest};

/// The Hindsight MCP tool handler. Holds the connection manager and search limits and
/// exposes every tool via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct HindsightTools {
    tool_router: ToolRouter<Self>,
    db: Arc<ConnectionManager>,
    search: SearchConfig,
}

/// Run a synchronous store call off the async runtime.
async fn blocking<T, F>(db: &Arc<ConnectionManager>, f: F) -> Result<T, String>
where
    F: FnOnce(&ConnectionManager) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| format!("db task failed: {e}"))?
        .map_err(|e| {
            tracing::warn!(error = %e, "tool call failed");
            e.to_string()
        })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl HindsightTools {
    pub fn new(db: Arc<ConnectionManager>, search: SearchConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            search,
        }
    }

    async fn run_search(&self, request: SearchRequest) -> Result<String, String> {
        let config = self.search;
        let response =
            blocking(&self.db, move |db| knowledge::search(db, &request, &config)).await?;
        to_json(&response)
    }

    #[tool(description = "Search lessons, errors and patterns with full-text search. Filters by entry type, technology, lesson category and tags (all must match).")]
    async fn query_knowledge(
        &self,
        Parameters(params): Parameters<QueryKnowledgeParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "query_knowledge called");
        let request = params.into_request()?;
        self.run_search(request).await
    }

    #[tool(description = "Find known errors and their fixes by error message. Optionally filter by technology.")]
    async fn search_errors(
        &self,
        Parameters(params): Parameters<SearchErrorsParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.error_message, "search_errors called");
        self.run_search(params.into()).await
    }

    #[tool(description = "Find code patterns by name or description, optionally limited to those available for a platform or language version.")]
    async fn get_patterns(
        &self,
        Parameters(params): Parameters<GetPatternsParams>,
    ) -> Result<String, String> {
        tracing::info!(query = ?params.query, "get_patterns called");
        self.run_search(params.into()).await
    }

    #[tool(description = "Record a lesson learned. Categories: pattern, practice, gotcha, decision.")]
    async fn add_lesson(
        &self,
        Parameters(params): Parameters<AddLessonParams>,
    ) -> Result<String, String> {
        let input: knowledge::types::NewLesson = params.into();
        let id = blocking(&self.db, move |db| knowledge::add_lesson(db, &input)).await?;
        to_json(&serde_json::json!({
            "success": true,
            "id": id,
            "message": format!("lesson {id} added"),
        }))
    }

    #[tool(description = "Update fields of an existing lesson. Tags, when given, replace the existing set.")]
    async fn update_lesson(
        &self,
        Parameters(params): Parameters<UpdateLessonParams>,
    ) -> Result<String, String> {
        let (id, update) = params.into_update();
        blocking(&self.db, move |db| knowledge::update_lesson(db, id, &update)).await?;
        to_json(&serde_json::json!({
            "success": true,
            "id": id,
            "message": format!("lesson {id} updated"),
        }))
    }

    #[tool(description = "Record a common error with its solution. The occurrence count starts at 1.")]
    async fn add_common_error(
        &self,
        Parameters(params): Parameters<AddCommonErrorParams>,
    ) -> Result<String, String> {
        let input: knowledge::types::NewErrorRecord = params.into();
        let id = blocking(&self.db, move |db| knowledge::add_error_record(db, &input)).await?;
        to_json(&serde_json::json!({
            "success": true,
            "id": id,
            "message": format!("error {id} added"),
        }))
    }

    #[tool(description = "Record another occurrence of a known error.")]
    async fn increment_error_count(
        &self,
        Parameters(params): Parameters<IncrementErrorCountParams>,
    ) -> Result<String, String> {
        let id = params.id;
        let count = blocking(&self.db, move |db| knowledge::increment_error_count(db, id)).await?;
        to_json(&serde_json::json!({
            "success": true,
            "id": id,
            "occurrence_count": count,
        }))
    }

    #[tool(description = "Record a reusable code pattern with an example and optional minimum platform/language versions.")]
    async fn add_pattern(
        &self,
        Parameters(params): Parameters<AddPatternParams>,
    ) -> Result<String, String> {
        let input: knowledge::types::NewPattern = params.into();
        let id = blocking(&self.db, move |db| knowledge::add_pattern(db, &input)).await?;
        to_json(&serde_json::json!({
            "success": true,
            "id": id,
            "message": format!("pattern {id} added"),
        }))
    }

    #[tool(description = "Record the context of a development session (date, project, log path, summary).")]
    async fn add_session_context(
        &self,
        Parameters(params): Parameters<AddSessionContextParams>,
    ) -> Result<String, String> {
        let input: knowledge::types::NewSession = params.into();
        let id = blocking(&self.db, move |db| knowledge::add_session(db, &input)).await?;
        to_json(&serde_json::json!({
            "success": true,
            "id": id,
            "message": format!("session {id} recorded"),
        }))
    }

    #[tool(description = "List every technology with its lesson and error counts.")]
    async fn list_technologies(&self) -> Result<String, String> {
        let techs = blocking(&self.db, |db| {
            db.with_snapshot(|tx| stats::list_technologies(tx))
        })
        .await?;
        to_json(&techs)
    }

    #[tool(description = "List every tag with the number of entries using it.")]
    async fn list_tags(&self) -> Result<String, String> {
        let tags = blocking(&self.db, |db| db.with_snapshot(|tx| tags::list_tags(tx))).await?;
        to_json(&tags)
    }

    #[tool(description = "Knowledge base statistics: totals, lessons by category, top technologies, most frequent errors, recent lessons.")]
    async fn get_statistics(&self) -> Result<String, String> {
        let stats = blocking(&self.db, |db| {
            let path = db.path().to_path_buf();
            db.with_snapshot(|tx| stats::statistics(tx, Some(&path)))
        })
        .await?;
        to_json(&stats)
    }

    #[tool(description = "Export knowledge as JSON, optionally filtered by entry type and technology.")]
    async fn export_knowledge(
        &self,
        Parameters(params): Parameters<ExportKnowledgeParams>,
    ) -> Result<String, String> {
        let request = params.into_request()?;
        let data = blocking(&self.db, move |db| {
            db.with_snapshot(|tx| export::export_knowledge(tx, &request))
        })
        .await?;
        to_json(&data)
    }
}

#[tool_handler]
impl ServerHandler for HindsightTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Hindsight is a knowledge base of lessons, common errors and code patterns. \
                 Use query_knowledge before starting work, search_errors when something fails, \
                 and add_lesson / add_common_error / add_pattern to record what you learned."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
