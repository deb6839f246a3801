pub mod answer;
pub mod bootstrap;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feedback;
pub mod heuristic;
pub mod http;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod retriever;
pub mod server;
pub mod similarity;

use tracing_subscriber::EnvFilter;

/// Structured logs on stderr, INFO unless `RUST_LOG` says otherwise. Stdout is reserved for
/// MCP JSON-RPC when serving on stdio.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
