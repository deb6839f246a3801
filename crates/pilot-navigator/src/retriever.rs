/// Embedding retriever.
///
/// Embeds the query through an external provider, compares it against the precomputed
/// per-entry vectors with cosine similarity and adds attribute boosts on top. Boosts are
/// additive and the final score is clamped to [0, 1].
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use navigator_common::error::CommonError;

use crate::catalog::Catalog;
use crate::config::RetrievalBoosts;
use crate::error::AppError;
use crate::model::{CatalogEntry, EntryEmbedding, RankingScore, ScoredEntry};
use crate::similarity::cosine_similarity;

/// Tags counted towards the tag boost, at most.
const MAX_BOOSTED_TAGS: usize = 3;

#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Embed a single query string.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AppError>;

    /// Model identifier reported back to callers.
    fn model(&self) -> &str;
}

/// Precomputed entry vectors, all of one dimension.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    dimension: usize,
    vectors: Vec<EntryEmbedding>,
}

impl EmbeddingIndex {
    pub fn new(vectors: Vec<EntryEmbedding>) -> Result<Self, AppError> {
        let Some(first) = vectors.first() else {
            return Err(AppError::Data("embeddings file contains no entries".to_string()));
        };
        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(AppError::Data(format!("embedding for {} is empty", first.id)));
        }
        if let Some(bad) = vectors.iter().find(|v| v.embedding.len() != dimension) {
            return Err(AppError::Data(format!(
                "embedding for {} has dimension {}, expected {dimension}",
                bad.id,
                bad.embedding.len()
            )));
        }
        let mut seen = HashSet::with_capacity(vectors.len());
        if let Some(dup) = vectors.iter().find(|v| !seen.insert(v.id.as_str())) {
            return Err(AppError::Data(format!("duplicate embedding for {}", dup.id)));
        }
        Ok(Self { dimension, vectors })
    }

    /// Load the `[{id, searchableText, embedding}]` file written by `generate-embeddings`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Data(format!("failed to read {}: {e}", path.display())))?;
        let vectors: Vec<EntryEmbedding> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Data(format!("invalid embeddings file {}: {e}", path.display()))
        })?;
        let index = Self::new(vectors)?;
        info!(
            path = %path.display(),
            vectors = index.len(),
            dimension = index.dimension,
            "embeddings loaded"
        );
        Ok(index)
    }

    /// Build an index from vectors embedded inline in the catalog (legacy datasets).
    pub fn from_catalog(catalog: &Catalog) -> Option<Self> {
        let vectors: Vec<EntryEmbedding> = catalog
            .all()
            .iter()
            .filter_map(|entry| {
                entry.embedding.as_ref().map(|embedding| EntryEmbedding {
                    id: entry.id.clone(),
                    searchable_text: entry.searchable_text(),
                    embedding: embedding.clone(),
                })
            })
            .collect();
        Self::new(vectors).ok()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

pub struct EmbeddingRetriever {
    catalog: Arc<Catalog>,
    index: Option<Arc<EmbeddingIndex>>,
    embedder: Arc<dyn QueryEmbedder>,
    boosts: RetrievalBoosts,
    top_k: usize,
    enabled: bool,
    stage_timeout: Duration,
}

impl EmbeddingRetriever {
    pub fn new(
        catalog: Arc<Catalog>,
        index: Option<Arc<EmbeddingIndex>>,
        embedder: Arc<dyn QueryEmbedder>,
        boosts: RetrievalBoosts,
        top_k: usize,
    ) -> Self {
        Self {
            catalog,
            index,
            embedder,
            boosts,
            top_k: top_k.max(1),
            enabled: true,
            stage_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        self.embedder.model()
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Rank catalog entries by boosted embedding similarity and keep the best `top_k`
    /// (the configured default when `None`).
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredEntry>, AppError> {
        if !self.enabled {
            return Err(AppError::Config("retrieval is disabled".to_string()));
        }
        let index = self.index.as_ref().ok_or_else(|| {
            AppError::Config(
                "embeddings unavailable, run generate-embeddings to create them".to_string(),
            )
        })?;

        let query_embedding = tokio::time::timeout(
            self.stage_timeout,
            self.embedder.embed_query(query),
        )
        .await
        .map_err(|_| CommonError::Timeout(self.stage_timeout.as_secs()))??;

        if query_embedding.len() != index.dimension {
            debug!(
                query_dimension = query_embedding.len(),
                index_dimension = index.dimension,
                "query embedding dimension mismatch, similarities will be zero"
            );
        }

        let query_lower = query.to_lowercase();
        let mut results: Vec<ScoredEntry> = index
            .vectors
            .iter()
            .filter_map(|stored| {
                let Some(entry) = self.catalog.get(&stored.id) else {
                    debug!(id = %stored.id, "embedding has no catalog entry, skipping");
                    return None;
                };
                let similarity = cosine_similarity(&query_embedding, &stored.embedding);
                let (score, reasons) = apply_boosts(entry, similarity, &query_lower, &self.boosts);
                Some(ScoredEntry {
                    entry: Arc::clone(entry),
                    score,
                    reasons,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k.unwrap_or(self.top_k).max(1));
        Ok(results)
    }
}

/// Add sector, tag and quality boosts to a base similarity. `query_lower` must already be
/// lowercased.
pub fn apply_boosts(
    entry: &CatalogEntry,
    base: f32,
    query_lower: &str,
    boosts: &RetrievalBoosts,
) -> (f32, Vec<String>) {
    let mut score = base;
    let mut reasons = Vec::new();

    if query_lower.contains(&entry.sector.as_str().to_lowercase()) {
        score += boosts.sector;
        reasons.push(format!("Matches {} sector", entry.sector));
    }

    let matching_tags: Vec<&str> = entry
        .tags
        .iter()
        .filter(|tag| {
            let tag = tag.trim().to_lowercase();
            !tag.is_empty() && (query_lower.contains(&tag) || tag.contains(query_lower))
        })
        .map(String::as_str)
        .collect();
    if !matching_tags.is_empty() {
        let counted = matching_tags.len().min(MAX_BOOSTED_TAGS);
        score += boosts.tag * counted as f32;
        reasons.push(format!(
            "Relevant tags: {}",
            matching_tags[..counted].join(", ")
        ));
    }

    let quality = entry.quality_score();
    score += quality / 10.0 * boosts.quality;
    if quality >= 7.0 {
        reasons.push(match entry.ranking {
            RankingScore::Quality(q) => format!("Highly recommended ({q}/10 overall pick)"),
            RankingScore::Risk(r) => format!("Low implementation risk ({r}/10)"),
        });
    }

    (score.clamp(0.0, 1.0), reasons)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Returns a fixed vector and counts calls.
    pub struct FixedEmbedder {
        pub vector: Vec<f32>,
        pub calls: AtomicUsize,
    }

    impl FixedEmbedder {
        pub fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryEmbedder for FixedEmbedder {
        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }

        fn model(&self) -> &str {
            "fixed-embedder"
        }
    }

    pub struct FailingEmbedder;

    /// Never answers.
    pub struct StalledEmbedder;

    #[async_trait]
    impl QueryEmbedder for StalledEmbedder {
        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, AppError> {
            std::future::pending().await
        }

        fn model(&self) -> &str {
            "stalled-embedder"
        }
    }

    #[async_trait]
    impl QueryEmbedder for FailingEmbedder {
        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, AppError> {
            Err(AppError::Service("embedding provider unreachable".to_string()))
        }

        fn model(&self) -> &str {
            "failing-embedder"
        }
    }
}
