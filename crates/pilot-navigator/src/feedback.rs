/// Append-only feedback sink.
///
/// Each accepted message becomes one timestamped line appended to the primary log and to
/// every mirror copy. There is no read API.
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use futures::future::try_join_all;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::AppError;

const PRIMARY_LOG: &str = "chat.log";

pub struct FeedbackLog {
    files: Vec<PathBuf>,
    dir: PathBuf,
}

impl FeedbackLog {
    /// `chat.log` plus `chat-copy-1.log` through `chat-copy-{copies}.log` inside `dir`.
    pub fn new(dir: impl Into<PathBuf>, copies: usize) -> Self {
        let dir = dir.into();
        let files = std::iter::once(dir.join(PRIMARY_LOG))
            .chain((1..=copies).map(|n| dir.join(format!("chat-copy-{n}.log"))))
            .collect();
        Self { files, dir }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Append one line to every log file. Blank messages are rejected without touching disk.
    pub async fn record(&self, message: &str, source: Option<&str>) -> Result<(), AppError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("message is required".to_string()));
        }
        let line = format_line(
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            source,
            message,
        );

        tokio::fs::create_dir_all(&self.dir).await?;
        try_join_all(self.files.iter().map(|path| append(path, &line))).await?;
        debug!(files = self.files.len(), "feedback recorded");
        Ok(())
    }
}

fn format_line(timestamp: &str, source: Option<&str>, message: &str) -> String {
    let source = source.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("unknown");
    format!("[{timestamp}][{source}] {message}\n")
}

async fn append(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
