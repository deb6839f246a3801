/// Precompute one embedding per catalog entry and write them to the embeddings file.
///
/// Uses the same configuration as the service (`PILOTS_CATALOG_PATH`, `PILOTS_EMBEDDINGS_PATH`,
/// `CATALOG_SCHEMA`, `OPENAI_EMBEDDING_MODEL`, `OPENAI_API_KEY`). Any provider failure aborts
/// the run and leaves the existing file untouched.
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::info;

use navigator_common::openai::{OpenAiClient, OpenAiClientConfig};
use pilot_navigator::catalog::Catalog;
use pilot_navigator::config::Config;
use pilot_navigator::model::EntryEmbedding;

const PAUSE_BETWEEN_CALLS: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pilot_navigator::init_tracing();

    let config = Config::from_env()?;
    let openai_config = OpenAiClientConfig::from_env();
    if !openai_config.has_credential() {
        bail!("OPENAI_API_KEY is not set; export a real key to generate embeddings");
    }
    let client = OpenAiClient::new(openai_config)?;

    let catalog = Catalog::load(&config.catalog_path, config.catalog_schema)?;
    let model = config.models.embedding.as_str();
    info!(entries = catalog.len(), model, "generating embeddings");

    let mut embeddings = Vec::with_capacity(catalog.len());
    for (i, entry) in catalog.all().iter().enumerate() {
        let searchable_text = entry.searchable_text();
        info!(n = i + 1, total = catalog.len(), id = %entry.id, "embedding entry");
        let embedding = client
            .embed(model, &searchable_text)
            .await
            .with_context(|| format!("embedding failed for {}", entry.id))?;
        embeddings.push(EntryEmbedding {
            id: entry.id.clone(),
            searchable_text,
            embedding,
        });
        tokio::time::sleep(PAUSE_BETWEEN_CALLS).await;
    }

    let json = serde_json::to_string_pretty(&embeddings)?;
    if let Some(parent) = config.embeddings_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&config.embeddings_path, json)
        .await
        .with_context(|| format!("writing {}", config.embeddings_path.display()))?;

    info!(
        count = embeddings.len(),
        dimension = embeddings.first().map_or(0, |e| e.embedding.len()),
        path = %config.embeddings_path.display(),
        "embeddings written"
    );
    Ok(())
}
