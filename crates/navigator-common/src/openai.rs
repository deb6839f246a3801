/// Minimal OpenAI-compatible client: one embedding call and one chat completion call.
///
/// Calls are never retried here. The only substitution the service performs (preferred
/// model to fallback model) lives with the caller and is driven by
/// `OpenAiClientError::is_model_unavailable`.
use std::time::Duration;

use reqwest::StatusCode;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

const PLACEHOLDER_KEYS: [&str; 2] = ["placeholder", "your_openai_api_key_here"];

/// Hints in an upstream error message that the model identifier itself was rejected.
const MODEL_HINTS: [&str; 4] = ["model", "not exist", "unsupported", "not found"];

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    /// `None` when unset, empty, or a known placeholder value.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_error_body_bytes: usize,
}

impl OpenAiClientConfig {
    /// `OPENAI_BASE_URL`, `OPENAI_API_KEY`, `OPENAI_TIMEOUT_SECS` (30).
    pub fn from_env() -> Self {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && !PLACEHOLDER_KEYS.contains(&k.as_str()));

        let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            max_error_body_bytes: 8 * 1024,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream {
        status: StatusCode,
        kind: Option<String>,
        message: String,
    },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

impl OpenAiClientError {
    /// The provider rejected the request because the requested model is unavailable, as
    /// opposed to content, auth or transport problems.
    pub fn is_model_unavailable(&self) -> bool {
        let (status, kind, message) = match self {
            OpenAiClientError::Upstream {
                status,
                kind,
                message,
            } => (*status, kind.as_deref(), message.as_str()),
            OpenAiClientError::UpstreamBody { status, body } => (*status, None, body.as_str()),
            _ => return false,
        };

        let message = message.to_lowercase();
        let names_model = MODEL_HINTS.iter().any(|hint| message.contains(hint));
        let rejected = matches!(status.as_u16(), 400 | 404 | 422)
            || matches!(
                kind,
                Some("invalid_request_error" | "not_found" | "model_not_found")
            );

        names_model && rejected
    }

    fn from_upstream(status: StatusCode, body: String) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => OpenAiClientError::Upstream {
                status,
                kind: envelope.error.r#type,
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| "unknown upstream error".to_string()),
            },
            Err(_) => OpenAiClientError::UpstreamBody { status, body },
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, OpenAiClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pilot-navigator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }

    /// `POST /embeddings` for a single input string.
    pub async fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, OpenAiClientError> {
        let request = EmbeddingRequest {
            model,
            input,
            encoding_format: "float",
        };
        let response: EmbeddingResponse = self
            .post_json("embeddings", &request, self.config.timeout)
            .await?;

        match response.data.into_iter().next() {
            Some(EmbeddingData { embedding }) if !embedding.is_empty() => Ok(embedding),
            Some(_) => Err(OpenAiClientError::Malformed("empty embedding vector".to_string())),
            None => Err(OpenAiClientError::Malformed("missing data[0].embedding".to_string())),
        }
    }

    /// `POST /chat/completions`. `timeout_override` replaces the configured per-call timeout.
    pub async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
        timeout_override: Option<Duration>,
    ) -> Result<ChatCompletionResponse, OpenAiClientError> {
        let timeout = timeout_override.unwrap_or(self.config.timeout);
        self.post_json("chat/completions", &request, timeout).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, OpenAiClientError> {
        let url = format!("{}/{path}", self.config.base_url);
        let mut builder = self.http.post(&url).timeout(timeout).json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;

        let status = resp.status();
        if status.is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
        let body = error_body(resp, self.config.max_error_body_bytes).await;
        Err(OpenAiClientError::from_upstream(status, body))
    }
}

async fn error_body(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(bytes) => String::from_utf8_lossy(&bytes[..bytes.len().min(max_bytes)]).into_owned(),
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            String::new()
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorObject,
}

#[derive(Deserialize)]
struct ErrorObject {
    message: Option<String>,
    r#type: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the provider returned any non-blank text.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_error_envelope() {
        let body = r#"{"error":{"message":"The model `gpt-5` does not exist","type":"invalid_request_error","code":"model_not_found"}}"#;
        let err = OpenAiClientError::from_upstream(StatusCode::NOT_FOUND, body.to_string());
        match &err {
            OpenAiClientError::Upstream { kind, message, .. } => {
                assert_eq!(kind.as_deref(), Some("invalid_request_error"));
                assert!(message.contains("does not exist"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_model_unavailable());
    }

    #[test]
    fn auth_and_content_errors_are_not_model_errors() {
        let auth = OpenAiClientError::from_upstream(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#
                .to_string(),
        );
        assert!(!auth.is_model_unavailable());

        let content = OpenAiClientError::Upstream {
            status: StatusCode::BAD_REQUEST,
            kind: Some("invalid_request_error".to_string()),
            message: "max_tokens is too large".to_string(),
        };
        assert!(!content.is_model_unavailable());

        let server = OpenAiClientError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: None,
            message: "model overloaded".to_string(),
        };
        assert!(!server.is_model_unavailable());
    }

    #[test]
    fn non_json_error_body_is_kept_verbatim() {
        let err = OpenAiClientError::from_upstream(
            StatusCode::NOT_FOUND,
            "model not found".to_string(),
        );
        match &err {
            OpenAiClientError::UpstreamBody { body, .. } => assert_eq!(body, "model not found"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_model_unavailable());
    }

    #[test]
    fn first_content_skips_blank_text() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  "}}]}"#,
        )
        .unwrap();
        assert_eq!(response.first_content(), None);

        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"Try [a]."},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(response.first_content(), Some("Try [a]."));
    }

    #[test]
    fn embedding_request_wire_shape() {
        let json = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: "water",
            encoding_format: "float",
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "text-embedding-3-small", "input": "water", "encoding_format": "float"})
        );
    }
}
