/// Per-query pipeline: embedding retrieval, then answer generation, with a heuristic fallback.
///
/// ```text
/// START -> RETRIEVE --ok--> GENERATE --ok--> DONE (retrieval)
///             |                 |
///             +--err/empty------+--err--> HEURISTIC -> DONE (heuristic)
/// ```
///
/// Nothing is shared between queries beyond the read-only catalog. Dropping the returned
/// future cancels whichever provider call is in flight.
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use navigator_common::api::{RecommendResponse, RecommendationPath};

use crate::answer::{AnswerGenerator, GeneratedAnswer};
use crate::catalog::Catalog;
use crate::error::AppError;
use crate::heuristic::HeuristicScorer;
use crate::model::{CatalogEntry, ScoredEntry};
use crate::retriever::EmbeddingRetriever;

/// Entries summarised by the heuristic narrative.
const HEURISTIC_TOP_N: usize = 3;

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub narrative: String,
    pub entries: Vec<ScoredEntry>,
    pub cited_ids: Vec<String>,
    pub path: RecommendationPath,
    pub model_used: Option<String>,
}

impl Recommendation {
    pub fn into_response(self) -> RecommendResponse {
        RecommendResponse {
            narrative: self.narrative,
            entries: self.entries.iter().map(ScoredEntry::recommended_view).collect(),
            cited_ids: self.cited_ids,
            path: self.path,
            model_used: self.model_used,
        }
    }
}

pub struct Navigator {
    catalog: Arc<Catalog>,
    retriever: EmbeddingRetriever,
    generator: AnswerGenerator,
    heuristic: HeuristicScorer,
}

impl Navigator {
    pub fn new(
        catalog: Arc<Catalog>,
        retriever: EmbeddingRetriever,
        generator: AnswerGenerator,
        heuristic: HeuristicScorer,
    ) -> Self {
        Self {
            catalog,
            retriever,
            generator,
            heuristic,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn retriever(&self) -> &EmbeddingRetriever {
        &self.retriever
    }

    /// Embedding retrieval only. Errors are returned as-is so the caller can signal fallback.
    pub async fn search(&self, query: &str) -> Result<Vec<ScoredEntry>, AppError> {
        let query = require_query(query)?;
        self.retriever.retrieve(query, None).await
    }

    /// Generate a narrative over explicitly chosen entries.
    pub async fn answer(
        &self,
        query: &str,
        entry_ids: &[String],
    ) -> Result<GeneratedAnswer, AppError> {
        let query = require_query(query)?;
        if entry_ids.is_empty() {
            return Err(AppError::Validation("query and entryIds are required".to_string()));
        }
        let shortlist = self.resolve_shortlist(entry_ids);
        if shortlist.is_empty() {
            return Err(AppError::NotFound("no matching pilots found".to_string()));
        }
        self.generator.generate(query, &shortlist).await
    }

    /// Catalog entries named in `entry_ids`, each once, in catalog order. Unknown ids are skipped.
    fn resolve_shortlist(&self, entry_ids: &[String]) -> Vec<Arc<CatalogEntry>> {
        let wanted: HashSet<&str> = entry_ids.iter().map(String::as_str).collect();
        self.catalog
            .all()
            .iter()
            .filter(|e| wanted.contains(e.id.as_str()))
            .cloned()
            .collect()
    }

    /// Full pipeline. Always produces a ranked, explained answer for a non-blank query.
    pub async fn recommend(&self, query: &str) -> Result<Recommendation, AppError> {
        let query = require_query(query)?;
        match self.try_retrieval_path(query).await {
            Ok(recommendation) => {
                info!(
                    query,
                    entries = recommendation.entries.len(),
                    model = recommendation.model_used.as_deref().unwrap_or_default(),
                    "recommendation served from retrieval path"
                );
                Ok(recommendation)
            }
            Err(e) if e.is_fallback() => {
                warn!(query, error = %e, "retrieval path failed, using heuristic fallback");
                Ok(self.heuristic_recommendation(query))
            }
            Err(e) => Err(e),
        }
    }

    async fn try_retrieval_path(&self, query: &str) -> Result<Recommendation, AppError> {
        let shortlist = self.retriever.retrieve(query, None).await?;
        if shortlist.is_empty() {
            return Err(AppError::Service("retrieval returned no entries".to_string()));
        }
        let entries: Vec<Arc<CatalogEntry>> =
            shortlist.iter().map(|s| Arc::clone(&s.entry)).collect();
        let answer = self.generator.generate(query, &entries).await?;
        Ok(Recommendation {
            narrative: answer.narrative,
            entries: shortlist,
            cited_ids: answer.cited_ids,
            path: RecommendationPath::Retrieval,
            model_used: Some(answer.model_used),
        })
    }

    /// Keyword-scored top entries with a templated narrative. Never calls a provider.
    pub fn heuristic_recommendation(&self, query: &str) -> Recommendation {
        let mut entries = self.heuristic.score(query, self.catalog.all());
        entries.truncate(HEURISTIC_TOP_N);
        Recommendation {
            narrative: heuristic_narrative(&entries),
            entries,
            cited_ids: Vec::new(),
            path: RecommendationPath::Heuristic,
            model_used: None,
        }
    }
}

fn require_query(query: &str) -> Result<&str, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("query is required".to_string()));
    }
    Ok(query)
}

pub fn heuristic_narrative(entries: &[ScoredEntry]) -> String {
    if entries.is_empty() {
        return "I couldn't find a pilot that matches your request. Try describing the problem, \
                sector, or technology you have in mind."
            .to_string();
    }
    let mut out = String::from("Based on your request, here are my top recommendations:\n\n");
    for (idx, scored) in entries.iter().enumerate() {
        let _ = writeln!(out, "{}. **{}**", idx + 1, scored.entry.title);
        let _ = writeln!(out, "   Match: {}%", scored.match_percent());
        if let Some(reason) = scored.reasons.first() {
            let _ = writeln!(out, "   Why: {reason}");
        }
        out.push('\n');
    }
    out.push_str("See the recommended pilots for full details.");
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::answer::testing::{model_not_found, ScriptedGenerator};
    use crate::config::{GenerationModels, RetrievalBoosts};
    use crate::model::fixtures::entry;
    use crate::model::{EntryEmbedding, Feasibility, RankingScore, SchemaVersion, Sector};
    use crate::retriever::testing::{FailingEmbedder, FixedEmbedder};
    use crate::retriever::{EmbeddingIndex, QueryEmbedder};

    fn catalog() -> Arc<Catalog> {
        let mut carbon = entry(
            "carbon-tracker",
            Sector::Environmental,
            &["carbon", "tracking"],
            RankingScore::Quality(8.0),
        );
        carbon.title = "Carbon Tracker".to_string();
        carbon.feasibility = Some(Feasibility::Solo90Day);
        let fleet = entry("fleet-router", Sector::Transportation, &["fleet"], RankingScore::Quality(3.0));
        Arc::new(Catalog::from_entries(SchemaVersion::Current, vec![carbon, fleet]).unwrap())
    }

    fn index() -> Arc<EmbeddingIndex> {
        Arc::new(
            EmbeddingIndex::new(vec![
                EntryEmbedding {
                    id: "carbon-tracker".to_string(),
                    searchable_text: String::new(),
                    embedding: vec![1.0, 0.0],
                },
                EntryEmbedding {
                    id: "fleet-router".to_string(),
                    searchable_text: String::new(),
                    embedding: vec![0.0, 1.0],
                },
            ])
            .unwrap(),
        )
    }

    fn models() -> GenerationModels {
        GenerationModels {
            preferred: "gpt-5".to_string(),
            fallback: Some("gpt-4o".to_string()),
            embedding: "text-embedding-3-small".to_string(),
        }
    }

    fn navigator(
        embedder: Arc<dyn QueryEmbedder>,
        backend: Arc<ScriptedGenerator>,
        enabled: bool,
    ) -> Navigator {
        let catalog = catalog();
        let retriever = EmbeddingRetriever::new(
            catalog.clone(),
            Some(index()),
            embedder,
            RetrievalBoosts::default(),
            3,
        )
        .with_enabled(enabled);
        let generator = AnswerGenerator::new(backend, models())
            .with_enabled(enabled)
            .with_stage_timeout(Duration::from_secs(5));
        Navigator::new(catalog, retriever, generator, HeuristicScorer::default())
    }

    #[tokio::test]
    async fn retrieval_path_returns_generated_narrative() {
        let backend = Arc::new(ScriptedGenerator::new(vec![Ok(
            "Start with [carbon-tracker].".to_string()
        )]));
        let nav = navigator(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), backend, true);

        let rec = nav.recommend("carbon tracking").await.unwrap();
        assert_eq!(rec.path, RecommendationPath::Retrieval);
        assert_eq!(rec.narrative, "Start with [carbon-tracker].");
        assert_eq!(rec.cited_ids, vec!["carbon-tracker"]);
        assert_eq!(rec.entries[0].entry.id, "carbon-tracker");
        assert_eq!(rec.model_used.as_deref(), Some("gpt-5"));
    }

    #[tokio::test]
    async fn embedding_failure_falls_back_to_heuristic() {
        let backend = Arc::new(ScriptedGenerator::new(vec![]));
        let nav = navigator(Arc::new(FailingEmbedder), backend.clone(), true);

        let rec = nav.recommend("low-risk solo carbon tracking").await.unwrap();
        assert_eq!(rec.path, RecommendationPath::Heuristic);
        assert_eq!(rec.entries[0].entry.id, "carbon-tracker");
        assert!(rec.narrative.starts_with("Based on your request"));
        assert!(rec.narrative.contains("1. **Carbon Tracker**"));
        assert!(rec.model_used.is_none());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_falls_back_to_heuristic() {
        let backend = Arc::new(ScriptedGenerator::new(vec![
            Err(model_not_found()),
            Err(AppError::Service("upstream 500".to_string())),
        ]));
        let nav = navigator(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), backend.clone(), true);

        let rec = nav.recommend("carbon").await.unwrap();
        assert_eq!(rec.path, RecommendationPath::Heuristic);
        assert_eq!(backend.calls(), vec!["gpt-5", "gpt-4o"]);
    }

    #[tokio::test]
    async fn disabled_flag_never_calls_provider() {
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));
        let backend = Arc::new(ScriptedGenerator::new(vec![Ok("x".to_string())]));
        let nav = navigator(embedder.clone(), backend.clone(), false);

        let rec = nav.recommend("carbon").await.unwrap();
        assert_eq!(rec.path, RecommendationPath::Heuristic);
        assert_eq!(embedder.calls(), 0);
        assert!(backend.calls().is_empty());

        let err = nav.search("carbon").await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn blank_query_is_a_validation_error() {
        let backend = Arc::new(ScriptedGenerator::new(vec![]));
        let nav = navigator(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), backend, true);
        assert!(matches!(
            nav.recommend("   ").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn answer_rejects_empty_ids_without_provider_call() {
        let backend = Arc::new(ScriptedGenerator::new(vec![Ok("x".to_string())]));
        let nav = navigator(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), backend.clone(), true);

        let err = nav.answer("carbon", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn answer_with_unknown_ids_is_not_found() {
        let backend = Arc::new(ScriptedGenerator::new(vec![Ok("x".to_string())]));
        let nav = navigator(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), backend.clone(), true);

        let err = nav
            .answer("carbon", &["nope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn answer_skips_unknown_ids_and_uses_the_rest() {
        let backend = Arc::new(ScriptedGenerator::new(vec![Ok(
            "See [fleet-router] and [fleet-router].".to_string()
        )]));
        let nav = navigator(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), backend, true);

        let answer = nav
            .answer("fleet", &["nope".to_string(), "fleet-router".to_string()])
            .await
            .unwrap();
        assert_eq!(answer.cited_ids, vec!["fleet-router"]);
    }

    #[tokio::test]
    async fn answer_renders_repeated_ids_once_in_catalog_order() {
        let backend = Arc::new(ScriptedGenerator::new(vec![Ok("See [carbon-tracker].".to_string())]));
        let nav = navigator(Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), backend.clone(), true);
        let ids: Vec<String> = ["fleet-router", "carbon-tracker", "fleet-router"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let shortlist: Vec<String> = nav
            .resolve_shortlist(&ids)
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(shortlist, vec!["carbon-tracker", "fleet-router"]);

        nav.answer("carbon", &ids).await.unwrap();
        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].matches("ID: fleet-router").count(), 1);
        assert_eq!(prompts[0].matches("ID: carbon-tracker").count(), 1);
    }

    #[test]
    fn heuristic_narrative_template() {
        let scored = ScoredEntry {
            entry: Arc::new(entry("a", Sector::Water, &[], RankingScore::Quality(5.0))),
            score: 0.456,
            reasons: vec!["Relevant to your query".to_string(), "Other".to_string()],
        };
        let narrative = heuristic_narrative(&[scored]);
        assert_eq!(
            narrative,
            "Based on your request, here are my top recommendations:\n\n\
             1. **Pilot a**\n   Match: 46%\n   Why: Relevant to your query\n\n\
             See the recommended pilots for full details."
        );
    }

    #[test]
    fn empty_heuristic_result_still_answers() {
        assert!(heuristic_narrative(&[]).starts_with("I couldn't find"));
    }

    #[test]
    fn recommendation_serializes_to_wire_shape() {
        let rec = Recommendation {
            narrative: "n".to_string(),
            entries: vec![],
            cited_ids: vec![],
            path: RecommendationPath::Heuristic,
            model_used: None,
        };
        let json = serde_json::to_value(rec.into_response()).unwrap();
        assert_eq!(json["path"], "heuristic");
        assert!(json.get("modelUsed").is_none());
    }
}
