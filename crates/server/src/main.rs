mod config;
mod http;
mod state;

use adapter::{
    AnalysisService, AnalysisSettings, LlmConfig, OpenAiClient, RedditClient, RedditConfig,
    RetryPolicy, Summarizer, WebPageReader,
};
use anyhow::Context;
use domain::Tolerance;
use dotenvy::dotenv;
use std::{sync::Arc, time::Duration};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Settings;
use http::router::build_router;
use state::AppState;
use storage::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("Failed to load configuration")?;

    let db = Db::new(&settings.database.url)
        .await
        .context("Failed to open database")?;

    let (tx_cmd, rx_cmd) = mpsc::channel(100);
    let (tx_events, _rx_events) = broadcast::channel(100);

    let reddit = &settings.reddit;
    let source = RedditClient::new(RedditConfig {
        user_agent: reddit.user_agent.clone(),
        proxy: reddit.proxy.clone(),
        max_retries: reddit.max_retries,
        max_retry_delay_secs: reddit.max_retry_delay_secs,
        timeout_secs: reddit.timeout_secs,
    })
    .context("Failed to build reddit client")?;
    let pages = WebPageReader::new(
        &reddit.user_agent,
        reddit.timeout_secs,
        RetryPolicy {
            attempts: reddit.max_retries,
            max_delay_secs: reddit.max_retry_delay_secs,
        },
    )
    .context("Failed to build page reader")?;

    let llm = &settings.llm;
    if llm.api_key.is_empty() {
        tracing::warn!("llm.api_key is empty; completions will likely be rejected");
    }
    let chat = OpenAiClient::new(LlmConfig {
        base_url: llm.base_url.clone(),
        api_key: llm.api_key.clone(),
        model: llm.model.clone(),
        vision_model: llm.vision_model.clone(),
        temperature: llm.temperature,
        timeout_secs: llm.timeout_secs,
    })
    .context("Failed to build LLM client")?;

    let analysis = &settings.analysis;
    let service = AnalysisService::new(
        Arc::new(source),
        Summarizer::new(Arc::new(chat), Arc::new(pages)),
        Arc::new(db.clone()),
        AnalysisSettings {
            top_k: analysis.top_k,
            tolerance: Tolerance {
                comment_count: analysis.count_tolerance,
                score: analysis.score_tolerance,
            },
        },
        tx_events.clone(),
    );

    let cancel_token = CancellationToken::new();
    let worker_token = cancel_token.clone();
    let worker = tokio::spawn(async move {
        if let Err(e) = adapter::start(service, rx_cmd, worker_token).await {
            tracing::error!("Analysis worker crashed: {:?}", e);
        }
    });

    let state = AppState {
        db,
        sender: tx_cmd,
        tx_events,
        request_timeout: Duration::from_secs(analysis.request_timeout_secs),
    };

    let app = build_router(state, &settings.server.cors_origins);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    worker.await.ok();
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
