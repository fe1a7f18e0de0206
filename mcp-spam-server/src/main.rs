//! mcp-spam-server - SpamAssassin analysis tools over MCP

use anyhow::Context;
use mcp_spam_server::{catalog, router, stdio, AppState};
use spamc_rs::config::{Config, LoggingConfig};
use spamc_rs::spamc::{RetryingDaemon, SpamDaemon, SpamcClient};
use spamc_rs::tools::ToolHandler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging)?;

    info!("🚀 Starting mcp-spam-server v{}", env!("CARGO_PKG_VERSION"));

    let client = SpamcClient::new(&config.spamassassin)?;
    info!("📧 Using spamd at {}", client.address());

    let retry = &config.spamassassin.retry;
    let daemon: Arc<dyn SpamDaemon> = if retry.max_retries > 0 {
        info!("Retrying transient scan failures up to {} times", retry.max_retries);
        Arc::new(RetryingDaemon::new(client, retry))
    } else {
        Arc::new(client)
    };

    // Fail fast when spamd is not answering
    daemon.ping().await.context("spamd did not answer PING")?;
    info!("✅ spamd is reachable");

    let tools = ToolHandler::new(daemon, &config.security)?;
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(tools, shutdown.clone()));

    let names: Vec<String> = catalog::tools().into_iter().map(|tool| tool.name).collect();
    info!("📋 Available tools: {}", names.join(", "));

    if config.server.serves_stdio() {
        info!("🔌 Serving MCP over stdio");
        tokio::spawn(shutdown_signal(shutdown));

        let input = tokio::io::BufReader::new(tokio::io::stdin());
        stdio::serve(state, input, tokio::io::stdout()).await?;

        info!("SpamAssassin MCP server stopped");
        // The blocking stdin reader would otherwise hold the runtime open
        std::process::exit(0);
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!("🌐 MCP server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("SpamAssassin MCP server stopped");
    Ok(())
}

/// `RUST_LOG` takes precedence over `logging.level`; output goes to stderr
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format.as_str() {
        "json" => registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()?,
        "pretty" => registry.with(fmt::layer().pretty().with_writer(std::io::stderr)).try_init()?,
        other => {
            registry.with(fmt::layer().pretty().with_writer(std::io::stderr)).try_init()?;
            warn!("Unknown log format {:?}, using pretty", other);
        }
    }
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM, then cancel every in-flight call
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, stopping server...");
    token.cancel();
}
