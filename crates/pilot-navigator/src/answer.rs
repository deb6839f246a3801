use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use navigator_common::error::CommonError;

use crate::config::GenerationModels;
use crate::error::AppError;
use crate::model::CatalogEntry;

static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([a-z0-9-]+)\]").expect("valid regex"));

const SYSTEM_PROMPT: &str = "You are the Pilot Navigator assistant. You can use:
- Retrieved context: the top pilot snippets (titles, one-liners, risks, plans).
- Your own pretrained knowledge for general questions.

INTENT DETECTION - classify the query first:
- RECOMMEND: the user asks for pilot recommendations, \"which pilot\", \"suggest a project\", \"what fits\"
- BUDGET: the user asks about cost, funding, budget or pricing
- GENERAL: questions about companies, competitors, industry, technology or any non-pilot topic
- CHITCHAT: greetings, thanks, hello

RESPONSE RULES BY INTENT:

1) RECOMMEND
  - Use ONLY the provided pilot context
  - Answer in 2-3 sentences citing pilot IDs like [pilot-id]
  - Explain why each pilot fits

2) BUDGET
  - Use the pilot fields plus your knowledge of typical project costs
  - Answer in one line with a numeric range (e.g. \"$45k-$60k\")
  - Cite at most 2 pilots [pilot-id] if relevant

3) GENERAL
  - First answer the question from your own knowledge (1-2 sentences)
  - Then, if a provided pilot is relevant, add: \"Related pilot: [pilot-id] - brief reason\"
  - If no pilot is relevant, answer without mentioning pilots

4) CHITCHAT
  - Be brief and friendly

FORMAT
- RECOMMEND/BUDGET: must include pilot IDs
- GENERAL: answer first, pilot optional
- CHITCHAT: no pilot IDs";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 300;

/// A text-generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion against `model`. Errors from a rejected model identifier must
    /// report `AppError::is_model_unavailable`.
    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, AppError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub narrative: String,
    pub cited_ids: Vec<String>,
    pub model_used: String,
}

pub struct AnswerGenerator {
    backend: Arc<dyn TextGenerator>,
    models: GenerationModels,
    enabled: bool,
    stage_timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, models: GenerationModels) -> Self {
        Self {
            backend,
            models,
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

    /// Write a narrative for `query` grounded in `shortlist` and collect the entry ids it cites.
    ///
    /// The preferred model is tried first. If the provider rejects it as unavailable, the
    /// fallback model is tried exactly once. Any other failure is returned to the caller.
    pub async fn generate(
        &self,
        query: &str,
        shortlist: &[Arc<CatalogEntry>],
    ) -> Result<GeneratedAnswer, AppError> {
        if !self.enabled {
            return Err(AppError::Config("answer generation is disabled".to_string()));
        }
        if shortlist.is_empty() {
            return Err(AppError::Validation("no entries to answer from".to_string()));
        }

        let user_prompt = build_user_prompt(query, &render_context(shortlist));
        let preferred = self.models.preferred.as_str();

        let (narrative, model_used) = match self.complete_with(preferred, &user_prompt).await {
            Ok(text) => (text, preferred),
            Err(err) => match self.fallback_for(&err) {
                Some(fallback) => {
                    warn!(
                        preferred,
                        fallback, "generation model unavailable, retrying with fallback"
                    );
                    (self.complete_with(fallback, &user_prompt).await?, fallback)
                }
                None => return Err(err),
            },
        };

        let cited_ids = extract_citations(&narrative);
        info!(
            model = model_used,
            entries = shortlist.len(),
            citations = cited_ids.len(),
            "answer generated"
        );
        Ok(GeneratedAnswer {
            narrative,
            cited_ids,
            model_used: model_used.to_string(),
        })
    }

    fn fallback_for(&self, err: &AppError) -> Option<&str> {
        let fallback = self.models.fallback.as_deref()?;
        (fallback != self.models.preferred && err.is_model_unavailable()).then_some(fallback)
    }

    async fn complete_with(&self, model: &str, user_prompt: &str) -> Result<String, AppError> {
        let call = self
            .backend
            .complete(model, SYSTEM_PROMPT, user_prompt, TEMPERATURE, MAX_TOKENS);
        tokio::time::timeout(self.stage_timeout, call)
            .await
            .map_err(|_| CommonError::Timeout(self.stage_timeout.as_secs()))?
    }
}

/// Fixed-format context block per entry, separated by `---` lines.
pub fn render_context(entries: &[Arc<CatalogEntry>]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            format!(
                "Pilot {n}: {title}\nID: {id}\nSector: {sector}\nDescription: {desc}\n\
                 Problem: {problem}\nApproach: {approach}\nCompetitors: {competitors}\n\
                 Overall Pick: {quality}/10\nTags: {tags}\n",
                n = idx + 1,
                title = entry.title,
                id = entry.id,
                sector = entry.sector,
                desc = entry.one_liner,
                problem = entry.problem,
                approach = entry.approach,
                competitors = entry.competitor_summary(),
                quality = entry.quality_score(),
                tags = entry.tags.join(", "),
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub fn build_user_prompt(query: &str, context: &str) -> String {
    format!(
        "User Query: \"{query}\"\n\nAvailable Pilot Context:\n{context}\n\n\
         Follow the intent detection rules above and respond accordingly."
    )
}

/// Bracketed ids in order of first appearance, without duplicates.
pub fn extract_citations(text: &str) -> Vec<String> {
    let mut cited: Vec<String> = Vec::new();
    for caps in CITATION_RE.captures_iter(text) {
        let id = &caps[1];
        if !cited.iter().any(|c| c == id) {
            cited.push(id.to_string());
        }
    }
    cited
}
