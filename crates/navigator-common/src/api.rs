/// Wire types shared by the HTTP and MCP surfaces.
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Free-text description of what the user is looking for.
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerParams {
    pub query: Option<String>,
    /// Shortlisted entry ids to ground the answer on. Must not be empty.
    #[serde(alias = "pilotIds")]
    pub entry_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct FeedbackParams {
    pub message: Option<String>,
    /// Where the message came from, e.g. "chat-widget". Defaults to "unknown".
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetPilotParams {
    /// Catalog entry id.
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListPilotsParams {
    /// Comma-separated sector names.
    pub sector: Option<String>,
    /// "solo-90-day", "configure" or "all".
    pub feasibility: Option<String>,
    pub max_risk: Option<f32>,
    /// Comma-separated tag fragments.
    pub tag: Option<String>,
    pub search: Option<String>,
    /// "relevance", "risk" or "feasibility".
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScoredEntryView {
    pub id: String,
    pub score: f32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub entries: Vec<ScoredEntryView>,
    pub query: String,
    pub model_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub narrative: String,
    pub cited_ids: Vec<String>,
    pub entry_ids: Vec<String>,
    pub model_used: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPath {
    Retrieval,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecommendedEntryView {
    pub id: String,
    pub title: String,
    pub score: f32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecommendResponse {
    pub narrative: String,
    pub entries: Vec<RecommendedEntryView>,
    pub cited_ids: Vec<String>,
    pub path: RecommendationPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// Signals the caller to use the degraded local scoring path.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FallbackEnvelope {
    pub error: String,
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagListResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
    pub entries: usize,
    pub embeddings: bool,
}
