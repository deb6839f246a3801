/// Error types shared by the navigator crates.
///
/// These cover infrastructure collaborators. Application errors live in the service crate
/// and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("provider error: {0}")]
    Provider(#[from] crate::openai::OpenAiClientError),

    #[error("provider timed out after {0}s")]
    Timeout(u64),
}
