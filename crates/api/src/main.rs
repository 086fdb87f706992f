use anyhow::Context;

use assettag_api::app;
use assettag_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    assettag_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let state = app::build_state(&config).await?;
    let router = app::build_app(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}
