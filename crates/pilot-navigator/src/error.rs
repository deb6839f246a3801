use navigator_common::error::CommonError;
use navigator_common::openai::OpenAiClientError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Feature disabled, credential missing, or embeddings unavailable.
    #[error("config error: {0}")]
    Config(String),

    /// The provider answered, but not with something usable.
    #[error("service error: {0}")]
    Service(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<OpenAiClientError> for AppError {
    fn from(e: OpenAiClientError) -> Self {
        AppError::Common(CommonError::Provider(e))
    }
}

impl AppError {
    /// Errors that mean "use the local heuristic path instead".
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            AppError::Common(_) | AppError::Config(_) | AppError::Service(_)
        )
    }

    /// The provider rejected the requested model identifier.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::Common(CommonError::Provider(e)) if e.is_model_unavailable()
        )
    }
}
