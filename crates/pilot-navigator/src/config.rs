use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::AppError;
use crate::model::SchemaVersion;

/// Additive boosts applied on top of embedding similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalBoosts {
    /// Flat amount when the query names the entry's sector.
    pub sector: f32,
    /// Per matching tag, counted up to three tags.
    pub tag: f32,
    /// Scaled by `quality / 10`.
    pub quality: f32,
}

impl Default for RetrievalBoosts {
    fn default() -> Self {
        Self {
            sector: 0.2,
            tag: 0.2,
            quality: 0.4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationModels {
    pub preferred: String,
    pub fallback: Option<String>,
    pub embedding: String,
}

/// Application configuration loaded explicitly from environment variables.
///
/// Only the catalog is required to exist; everything on the provider side is optional
/// and its absence routes requests to the heuristic path.
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub embeddings_path: PathBuf,
    /// Schema of a bare-array catalog file. Versioned envelopes carry their own tag.
    pub catalog_schema: Option<SchemaVersion>,
    pub rag_enabled: bool,
    pub models: GenerationModels,
    pub boosts: RetrievalBoosts,
    pub top_k: usize,
    /// Upper bound on a whole provider stage (embedding or generation), on top of the
    /// per-request HTTP timeout.
    pub stage_timeout: Duration,
    pub chat_log_dir: PathBuf,
    pub chat_log_copies: usize,
    pub redis_url: Option<String>,
    pub embedding_cache_ttl_secs: u64,
    pub http_listen_addr: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `PILOTS_CATALOG_PATH` (`data/pilots.json`)
    /// - `PILOTS_EMBEDDINGS_PATH` (`data/pilots-embeddings.json`)
    /// - `CATALOG_SCHEMA`: `legacy` or `current`
    /// - `RAG_ENABLED` (on unless exactly `false`)
    /// - `OPENAI_MODEL` (`gpt-5`), `OPENAI_FALLBACK_MODEL` (`gpt-4o`),
    ///   `OPENAI_EMBEDDING_MODEL` (`text-embedding-3-small`)
    /// - `RAG_SECTOR_BOOST` (0.2), `RAG_TAG_BOOST` (0.2), `RAG_OVERALLPICK_BOOST` (0.4)
    /// - `RAG_TOP_K` (3)
    /// - `RAG_STAGE_TIMEOUT_SECS` (30)
    /// - `CHAT_LOG_DIR` (`logs`), `CHAT_LOG_COPIES` (5)
    /// - `REDIS_URL`, `EMBEDDING_CACHE_TTL_SECS` (86400)
    /// - `NAVIGATOR_HTTP_LISTEN_ADDR`: serve HTTP instead of MCP on stdio
    pub fn from_env() -> Result<Self, AppError> {
        let catalog_path = PathBuf::from(env_or("PILOTS_CATALOG_PATH", "data/pilots.json"));

        let catalog_schema = match std::env::var("CATALOG_SCHEMA") {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(raw.parse::<SchemaVersion>().map_err(AppError::Config)?)
            }
            _ => None,
        };

        let fallback = env_or("OPENAI_FALLBACK_MODEL", "gpt-4o");
        let models = GenerationModels {
            preferred: env_or("OPENAI_MODEL", "gpt-5"),
            fallback: Some(fallback).filter(|m| !m.trim().is_empty()),
            embedding: env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
        };

        let defaults = RetrievalBoosts::default();
        let boosts = RetrievalBoosts {
            sector: env_parse("RAG_SECTOR_BOOST", defaults.sector),
            tag: env_parse("RAG_TAG_BOOST", defaults.tag),
            quality: env_parse("RAG_OVERALLPICK_BOOST", defaults.quality),
        };

        let top_k = env_parse::<usize>("RAG_TOP_K", 3);
        let top_k = if top_k == 0 {
            warn!("RAG_TOP_K must be at least 1, using 3");
            3
        } else {
            top_k
        };

        Ok(Self {
            catalog_path,
            embeddings_path: PathBuf::from(env_or(
                "PILOTS_EMBEDDINGS_PATH",
                "data/pilots-embeddings.json",
            )),
            catalog_schema,
            rag_enabled: parse_enabled_flag(std::env::var("RAG_ENABLED").ok().as_deref()),
            models,
            boosts,
            top_k,
            stage_timeout: Duration::from_secs(env_parse("RAG_STAGE_TIMEOUT_SECS", 30)),
            chat_log_dir: PathBuf::from(env_or("CHAT_LOG_DIR", "logs")),
            chat_log_copies: env_parse("CHAT_LOG_COPIES", 5),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            embedding_cache_ttl_secs: env_parse("EMBEDDING_CACHE_TTL_SECS", 86_400),
            http_listen_addr: std::env::var("NAVIGATOR_HTTP_LISTEN_ADDR")
                .ok()
                .filter(|s| !s.is_empty()),
        })
    }
}

/// Retrieval stays on unless the flag is exactly `false`.
pub fn parse_enabled_flag(raw: Option<&str>) -> bool {
    raw != Some("false")
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or_default(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or_default<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: &str, default: T) -> T {
    raw.trim().parse::<T>().unwrap_or_else(|_| {
        warn!(key, value = raw, %default, "unparseable config value, using default");
        default
    })
}
