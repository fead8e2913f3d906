use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use translation_helps_server::config::{ServerConfig, Transport};
use translation_helps_server::fetcher::UnifiedFetcher;
use translation_helps_server::handlers::McpContext;
use translation_helps_server::server::{self, McpServer};

#[tokio::main]
async fn main() {
    // stdout carries the stdio transport; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let fetcher = match UnifiedFetcher::http(&config.catalog_url, config.fetcher_settings()) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            tracing::error!("failed to build catalog client: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        catalog = %config.catalog_url,
        transport = ?config.transport,
        "translation-helps-server starting"
    );

    let context = McpContext::new(fetcher, config.tool_timeout);
    let outcome = match config.transport {
        Transport::Stdio => McpServer::new(context).run().await,
        Transport::Http => server::serve_http(context, config.http_addr)
            .await
            .map_err(Into::into),
    };

    if let Err(e) = outcome {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}
