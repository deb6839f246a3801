use std::sync::Arc;

use tracing::{info, warn};

use navigator_common::openai::{OpenAiClient, OpenAiClientConfig};
use navigator_common::redis::RedisCache;

use crate::answer::AnswerGenerator;
use crate::cache::EmbeddingCache;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::AppError;
use crate::feedback::FeedbackLog;
use crate::heuristic::HeuristicScorer;
use crate::orchestrator::Navigator;
use crate::provider::{OpenAiEmbedder, OpenAiGenerator};
use crate::retriever::{EmbeddingIndex, EmbeddingRetriever};

/// Long-lived collaborators shared by both surfaces.
pub struct Services {
    pub navigator: Arc<Navigator>,
    pub feedback: Arc<FeedbackLog>,
}

impl Services {
    /// Load the catalog (fatal on failure), then wire up the provider-backed stages.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let catalog = Arc::new(Catalog::load(&config.catalog_path, config.catalog_schema)?);
        let index = load_index(config, &catalog).map(Arc::new);

        let openai_config = OpenAiClientConfig::from_env();
        if !openai_config.has_credential() {
            warn!("OpenAI API key not configured, recommendations will use keyword scoring");
        }
        let client = Arc::new(OpenAiClient::new(openai_config)?);

        let redis = RedisCache::new(config.redis_url.as_deref());
        if redis.is_available().await {
            info!("redis connected");
        } else {
            info!("redis unavailable, running without query-embedding cache");
        }
        let cache = Arc::new(EmbeddingCache::new(redis, config.embedding_cache_ttl_secs));

        let embedder = Arc::new(OpenAiEmbedder::new(
            Arc::clone(&client),
            config.models.embedding.clone(),
            cache,
        ));
        let retriever = EmbeddingRetriever::new(
            Arc::clone(&catalog),
            index,
            embedder,
            config.boosts,
            config.top_k,
        )
        .with_enabled(config.rag_enabled)
        .with_stage_timeout(config.stage_timeout);

        let generator = AnswerGenerator::new(
            Arc::new(OpenAiGenerator::new(client)),
            config.models.clone(),
        )
        .with_enabled(config.rag_enabled)
        .with_stage_timeout(config.stage_timeout);

        let navigator = Navigator::new(catalog, retriever, generator, HeuristicScorer::default());
        let feedback = FeedbackLog::new(&config.chat_log_dir, config.chat_log_copies);

        Ok(Self {
            navigator: Arc::new(navigator),
            feedback: Arc::new(feedback),
        })
    }
}

/// The embeddings file, else vectors inlined in the catalog, else nothing. Never fatal: without
/// an index only the retrieval path is lost.
fn load_index(config: &Config, catalog: &Catalog) -> Option<EmbeddingIndex> {
    if config.embeddings_path.exists() {
        match EmbeddingIndex::load(&config.embeddings_path) {
            Ok(index) => return Some(index),
            Err(e) => warn!(error = %e, "embeddings file unusable, retrieval path disabled"),
        }
        return None;
    }
    match EmbeddingIndex::from_catalog(catalog) {
        Some(index) => {
            info!(vectors = index.len(), "using embeddings inlined in the catalog");
            Some(index)
        }
        None => {
            warn!(
                path = %config.embeddings_path.display(),
                "no embeddings available, run generate-embeddings to enable retrieval"
            );
            None
        }
    }
}
