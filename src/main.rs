use tracing_subscriber::EnvFilter;

use paper_search::api;
use paper_search::config::Config;
use paper_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; real environment variables take precedence
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Index: {} ({})",
        config.index.index_name,
        config.index.url.as_deref().unwrap_or("<unset>")
    );
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let bind_addr = config.bind_addr.clone();
    let state = match AppState::connect(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            return Err(e.into());
        }
    };

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
