use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::info;

use navigator_common::api::{
    FeedbackParams, GetPilotParams, ListPilotsParams, OkResponse, QueryParams,
    RecommendResponse, SearchResponse,
};

use crate::error::AppError;
use crate::feedback::FeedbackLog;
use crate::model::{CatalogEntry, ScoredEntry};
use crate::orchestrator::Navigator;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PilotListResponse {
    pub total: usize,
    pub entries: Vec<CatalogEntry>,
}

#[derive(Clone)]
pub struct PilotNavigatorServer {
    navigator: Arc<Navigator>,
    feedback: Arc<FeedbackLog>,
    tool_router: ToolRouter<PilotNavigatorServer>,
}

impl PilotNavigatorServer {
    pub fn new(navigator: Arc<Navigator>, feedback: Arc<FeedbackLog>) -> Self {
        Self {
            navigator,
            feedback,
            tool_router: Self::tool_router(),
        }
    }
}

fn tool_error(e: AppError) -> String {
    if e.is_fallback() {
        format!("{e} (fallback: use recommend_pilots for keyword-ranked results)")
    } else {
        e.to_string()
    }
}

#[tool_router]
impl PilotNavigatorServer {
    #[tool(
        description = "Recommend pilot ideas for a free-text request. Returns a narrative plus the \
                       ranked entries with match scores and reasons. Falls back to keyword scoring \
                       when the language model is unavailable."
    )]
    async fn recommend_pilots(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<Json<RecommendResponse>, String> {
        let query = params.query.unwrap_or_default();
        let recommendation = self
            .navigator
            .recommend(&query)
            .await
            .map_err(tool_error)?;
        Ok(Json(recommendation.into_response()))
    }

    #[tool(description = "Semantic search over the pilot catalog using embeddings and attribute boosts.")]
    async fn search_pilots(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<Json<SearchResponse>, String> {
        let query = params.query.unwrap_or_default();
        let results = self.navigator.search(&query).await.map_err(tool_error)?;
        Ok(Json(SearchResponse {
            entries: results.iter().map(ScoredEntry::view).collect(),
            query,
            model_used: self.navigator.retriever().model().to_string(),
        }))
    }

    #[tool(description = "Get one pilot by id, including problem, approach, competitors and KPIs.")]
    async fn get_pilot(
        &self,
        Parameters(params): Parameters<GetPilotParams>,
    ) -> Result<Json<CatalogEntry>, String> {
        let id = params.id.trim();
        if id.is_empty() {
            return Err("id must not be empty".to_string());
        }
        self.navigator
            .catalog()
            .get(id)
            .map(|e| Json(CatalogEntry::clone(e)))
            .ok_or_else(|| format!("pilot not found: {id}"))
    }

    #[tool(
        description = "List pilots, optionally filtered by sector (comma-separated), feasibility, \
                       maxRisk, tag or search text, and sorted by relevance, risk or feasibility."
    )]
    async fn list_pilots(
        &self,
        Parameters(params): Parameters<ListPilotsParams>,
    ) -> Result<Json<PilotListResponse>, String> {
        let entries = self
            .navigator
            .catalog()
            .browse(&params)
            .map_err(tool_error)?;
        Ok(Json(PilotListResponse {
            total: entries.len(),
            entries: entries.iter().map(|e| CatalogEntry::clone(e)).collect(),
        }))
    }

    #[tool(description = "Record a feedback or chat message in the append-only log.")]
    async fn log_feedback(
        &self,
        Parameters(params): Parameters<FeedbackParams>,
    ) -> Result<Json<OkResponse>, String> {
        let message = params.message.unwrap_or_default();
        self.feedback
            .record(&message, params.source.as_deref())
            .await
            .map_err(tool_error)?;
        info!(source = params.source.as_deref().unwrap_or("unknown"), "feedback logged");
        Ok(Json(OkResponse { ok: true }))
    }
}

#[tool_handler]
impl ServerHandler for PilotNavigatorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pilot-navigator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Pilot Navigator MCP server. Recommends pilot ideas from a curated catalog. Use \
                 recommend_pilots for natural language requests, search_pilots for raw semantic \
                 ranking, get_pilot and list_pilots for browsing, and log_feedback to record \
                 user feedback."
                    .to_string(),
            ),
        }
    }
}
