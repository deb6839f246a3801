/// HTTP surface.
///
/// JSON in and out with camelCase fields. Provider-side failures are reported with the
/// `{error, fallback: true}` envelope so clients know to switch to local scoring.
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, warn};

use navigator_common::api::{
    AnswerParams, AnswerResponse, ErrorBody, FallbackEnvelope, FeedbackParams, HealthResponse,
    ListPilotsParams, OkResponse, QueryParams, RecommendResponse, SearchResponse,
    TagListResponse,
};

use crate::error::AppError;
use crate::feedback::FeedbackLog;
use crate::model::{CatalogEntry, ScoredEntry};
use crate::orchestrator::Navigator;

#[derive(Clone)]
pub struct AppState {
    navigator: Arc<Navigator>,
    feedback: Arc<FeedbackLog>,
}

impl AppState {
    pub fn new(navigator: Arc<Navigator>, feedback: Arc<FeedbackLog>) -> Self {
        Self {
            navigator,
            feedback,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search", post(search))
        .route("/api/answer", post(answer))
        .route("/api/recommend", post(recommend))
        .route("/api/chat-log", post(chat_log))
        .route("/api/pilots", get(list_pilots))
        .route("/api/pilots/{id}", get(get_pilot))
        .route("/api/top-picks", get(top_picks))
        .route("/api/tags", get(tags))
        .with_state(state)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match &self {
            AppError::Config(_) => {
                warn!(error = %message, "request routed to fallback");
                fallback(StatusCode::SERVICE_UNAVAILABLE, message)
            }
            AppError::Common(_) | AppError::Service(_) => {
                warn!(error = %message, "provider failure, signalling fallback");
                fallback(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            AppError::Validation(_) => plain(StatusCode::BAD_REQUEST, message),
            AppError::NotFound(_) => plain(StatusCode::NOT_FOUND, message),
            AppError::Data(_) | AppError::Io(_) => {
                error!(error = %message, "request failed");
                plain(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

fn fallback(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(FallbackEnvelope {
            error,
            fallback: true,
        }),
    )
        .into_response()
}

fn plain(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        entries: state.navigator.catalog().len(),
        embeddings: state.navigator.retriever().has_index(),
    })
}

async fn search(
    State(state): State<AppState>,
    Json(params): Json<QueryParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.query.unwrap_or_default();
    let results = state.navigator.search(&query).await?;
    Ok(Json(SearchResponse {
        entries: results.iter().map(ScoredEntry::view).collect(),
        query,
        model_used: state.navigator.retriever().model().to_string(),
    }))
}

async fn answer(
    State(state): State<AppState>,
    Json(params): Json<AnswerParams>,
) -> Result<Json<AnswerResponse>, AppError> {
    let query = params.query.unwrap_or_default();
    let entry_ids = params.entry_ids.unwrap_or_default();
    let generated = state.navigator.answer(&query, &entry_ids).await?;
    Ok(Json(AnswerResponse {
        narrative: generated.narrative,
        cited_ids: generated.cited_ids,
        entry_ids,
        model_used: generated.model_used,
    }))
}

async fn recommend(
    State(state): State<AppState>,
    Json(params): Json<QueryParams>,
) -> Result<Json<RecommendResponse>, AppError> {
    let query = params.query.unwrap_or_default();
    let recommendation = state.navigator.recommend(&query).await?;
    Ok(Json(recommendation.into_response()))
}

async fn chat_log(
    State(state): State<AppState>,
    Json(params): Json<FeedbackParams>,
) -> Result<Json<OkResponse>, AppError> {
    let message = params.message.unwrap_or_default();
    state
        .feedback
        .record(&message, params.source.as_deref())
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn list_pilots(
    State(state): State<AppState>,
    Query(params): Query<ListPilotsParams>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    let entries = state.navigator.catalog().browse(&params)?;
    Ok(Json(entries.iter().map(|e| CatalogEntry::clone(e)).collect()))
}

async fn get_pilot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntry>, AppError> {
    state
        .navigator
        .catalog()
        .get(&id)
        .map(|e| Json(CatalogEntry::clone(e)))
        .ok_or_else(|| AppError::NotFound(format!("pilot '{id}' not found")))
}

async fn top_picks(State(state): State<AppState>) -> Json<Vec<CatalogEntry>> {
    let picks = state.navigator.catalog().top_picks();
    Json(picks.iter().map(|e| CatalogEntry::clone(e)).collect())
}

async fn tags(State(state): State<AppState>) -> Json<TagListResponse> {
    Json(TagListResponse {
        tags: state.navigator.catalog().all_tags(),
    })
}
