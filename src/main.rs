mod api;
mod compiler;
mod config;
mod constraints;
mod core;
mod error;
mod judger;
mod languages;
mod pipeline;
mod runner;
mod sandbox;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::ServerConfig;
use crate::pipeline::Judge;
use crate::runner::SandboxedRunner;
use crate::sandbox::SandboxConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judge_core=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let server_config = ServerConfig::from_env()?;

    languages::init_languages(server_config.languages_config.as_deref())?;
    match &server_config.languages_config {
        Some(path) => info!("Loaded language configurations from {}", path.display()),
        None => info!("Using built-in language configurations"),
    }

    let sandbox_config = SandboxConfig::from_env()?;
    info!(
        "Sandbox config: temp_root={}, execute_timeout={}ms, default limits {}ms/{}MB",
        sandbox_config.temp_root.display(),
        sandbox_config.execute_timeout_ms,
        sandbox_config.default_limits.time_limit_ms,
        sandbox_config.default_limits.memory_limit_mb
    );

    let runner = SandboxedRunner::new();
    info!("Memory monitor: {}", runner.monitor_name());

    let judge = Judge::new(Arc::new(runner), sandbox_config);
    let app = api::router(judge);

    let listener = tokio::net::TcpListener::bind(server_config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", server_config.bind_addr))?;
    info!("Judge service listening on {}", server_config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
