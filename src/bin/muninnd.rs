//! muninnd: Muninn daemon.
//!
//! Serves the [`AnalysisService`](muninn::AnalysisService) over HTTP.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use muninn::model::{ModelSet, PromptSpec, VertexClient};
use muninn::server::config::{Config, ModelConfig, PromptsConfig, Secrets};
use muninn::types::Operation;
use muninn::{AnalysisService, BatchCoordinator, MuninnError, ResultCache};

/// Muninn daemon: cached lyric emotion analysis.
#[derive(Parser)]
#[command(name = "muninnd")]
#[command(version = muninn::PKG_VERSION)]
#[command(about = "Muninn lyric emotion analysis daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "MUNINN_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let service = build_service(&config, &secrets)?;
    let app = muninn::server::router(service, &config.server.limits);

    let listener = tokio::net::TcpListener::bind(&config.server.address)
        .await
        .map_err(|e| {
            MuninnError::Configuration(format!(
                "Failed to bind {}: {e}",
                config.server.address
            ))
        })?;

    info!(version = muninn::version_string(), address = %config.server.address, "muninnd starting");

    muninn::server::serve(listener, app, shutdown_signal()).await?;

    info!("muninnd stopped");
    Ok(())
}

/// Wire store, models, cache, and batch coordinator from configuration.
fn build_service(config: &Config, secrets: &Secrets) -> Result<AnalysisService, MuninnError> {
    let store = config.storage.open()?;
    info!(backend = store.name(), "storage ready");

    let token = secrets.access_token();
    if token.is_none() {
        warn!("no Vertex access token configured; requests will be sent unauthenticated");
    }

    let models = ModelSet::new(
        Arc::new(build_client(&config.model, &config.prompts, Operation::Profile, token.as_deref())?),
        Arc::new(build_client(&config.model, &config.prompts, Operation::Tags, token.as_deref())?),
    );

    let cache = ResultCache::new(store, models).with_policy(config.cache);
    let batch = BatchCoordinator::new(cache).with_config(config.batch);
    Ok(AnalysisService::new(batch))
}

fn build_client(
    model: &ModelConfig,
    prompts: &PromptsConfig,
    operation: Operation,
    token: Option<&str>,
) -> Result<VertexClient, MuninnError> {
    let template = prompts.template(operation)?;
    let mut client = VertexClient::new(
        &model.project_id,
        &model.location,
        &model.model_name,
        PromptSpec::for_operation(operation, template),
        model.generation(),
    );
    if let Some(base_url) = &model.base_url {
        client = client.with_base_url(base_url);
    }
    if let Some(token) = token {
        client = client.with_access_token(token);
    }
    Ok(client)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
