/// OpenAI-backed implementations of the retrieval and generation seams.
///
/// Both refuse to make a network call when no usable credential is configured and report a
/// config error instead, which sends the request down the heuristic path.
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use navigator_common::openai::{ChatCompletionRequest, Message, OpenAiClient};

use crate::answer::TextGenerator;
use crate::cache::EmbeddingCache;
use crate::error::AppError;
use crate::retriever::QueryEmbedder;

fn require_credential(client: &OpenAiClient) -> Result<(), AppError> {
    if client.config().has_credential() {
        Ok(())
    } else {
        Err(AppError::Config("OpenAI API key not configured".to_string()))
    }
}

pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    cache: Arc<EmbeddingCache>,
}

impl OpenAiEmbedder {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, cache: Arc<EmbeddingCache>) -> Self {
        Self {
            client,
            model: model.into(),
            cache,
        }
    }
}

#[async_trait]
impl QueryEmbedder for OpenAiEmbedder {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AppError> {
        require_credential(&self.client)?;

        if let Some(cached) = self.cache.get_query_embedding(&self.model, query).await {
            return Ok(cached);
        }

        let embedding = self.client.embed(&self.model, query).await?;
        debug!(model = %self.model, dimension = embedding.len(), "query embedded");
        self.cache
            .set_query_embedding(&self.model, query, &embedding)
            .await;
        Ok(embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub struct OpenAiGenerator {
    client: Arc<OpenAiClient>,
}

impl OpenAiGenerator {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, AppError> {
        require_credential(&self.client)?;

        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        };
        let response = self.client.chat_completions(request, None).await?;
        if let Some(usage) = &response.usage {
            debug!(
                model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| AppError::Service(format!("model {model} returned no content")))
    }
}
