use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;

use pilot_navigator::bootstrap::Services;
use pilot_navigator::config::Config;
use pilot_navigator::http::{self, AppState};
use pilot_navigator::server::PilotNavigatorServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pilot_navigator::init_tracing();

    info!("starting pilot-navigator");

    let config = Config::from_env()?;
    info!(
        catalog = %config.catalog_path.display(),
        embeddings = %config.embeddings_path.display(),
        rag_enabled = config.rag_enabled,
        model = %config.models.preferred,
        top_k = config.top_k,
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    let services = Services::from_config(&config).await?;
    info!(
        entries = services.navigator.catalog().len(),
        embeddings = services.navigator.retriever().has_index(),
        "catalog ready"
    );

    if let Some(addr) = &config.http_listen_addr {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "HTTP server ready");
        let app = http::router(AppState::new(services.navigator, services.feedback));
        axum::serve(listener, app).await?;
        info!("HTTP server shut down");
    } else {
        info!("MCP server ready, serving on stdio");
        let server = PilotNavigatorServer::new(services.navigator, services.feedback);
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
