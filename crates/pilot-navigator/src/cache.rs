/// Redis cache for query embeddings.
///
/// Every operation degrades to a miss when Redis is unavailable, so the embedding provider is
/// simply called again.
///
/// Key schema:
/// - `pnav:v1:qemb:{sha256(model|query)}`: JSON array of f32 (TTL: configurable, 24h default)
use sha2::{Digest, Sha256};
use tracing::debug;

use navigator_common::redis::RedisCache;

const KEY_PREFIX: &str = "pnav:v1:";

pub struct EmbeddingCache {
    redis: RedisCache,
    ttl_secs: u64,
}

impl EmbeddingCache {
    pub fn new(redis: RedisCache, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    pub fn disabled() -> Self {
        Self::new(RedisCache::disabled(), 0)
    }

    pub async fn get_query_embedding(&self, model: &str, query: &str) -> Option<Vec<f32>> {
        let key = query_embedding_key(model, query);
        let embedding: Vec<f32> = self.redis.get_json(&key).await?;
        debug!(key, "query embedding cache hit");
        Some(embedding).filter(|e| !e.is_empty())
    }

    pub async fn set_query_embedding(&self, model: &str, query: &str, embedding: &[f32]) {
        if self.ttl_secs == 0 {
            return;
        }
        let key = query_embedding_key(model, query);
        self.redis.set_json(&key, embedding, self.ttl_secs).await;
    }
}

/// Deterministic key per (model, query) pair.
fn query_embedding_key(model: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"|");
    hasher.update(query.trim().as_bytes());
    let hash = hasher.finalize();
    format!("{KEY_PREFIX}qemb:{:x}", hash)
}
