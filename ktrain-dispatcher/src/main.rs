use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ktrain_dispatcher::api::{self, AppState};
use ktrain_dispatcher::config::Config;
use ktrain_dispatcher::manifest::ManifestBuilder;
use ktrain_dispatcher::service::{Dispatcher, Reconciler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ktrain_dispatcher=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ktrain dispatcher...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Namespace: {}, image: {}, reuse window: {:?}",
        config.manifest.namespace,
        config.manifest.image,
        config.reuse.window
    );

    let cluster = ktrain_dispatcher::connect_cluster(&config).await?;
    let shutdown = CancellationToken::new();

    let reconciler = Reconciler::new(cluster.clone(), config.reconcile);
    let reconciler_handle = tokio::spawn(reconciler.run(shutdown.clone()));

    let dispatcher = Dispatcher::new(
        cluster,
        ManifestBuilder::new(config.manifest.clone()),
        config.reuse,
        config.wait_poll_interval,
    );

    if config.auth_token.is_none() {
        tracing::warn!("KTRAIN_AUTH_TOKEN is not set; the API is unauthenticated");
    }

    // Build router with all API endpoints
    let app = api::create_router(AppState::new(
        Arc::new(dispatcher),
        config.auth_token.clone(),
        shutdown.clone(),
    ));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received, draining...");
            signal.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = reconciler_handle.await {
        tracing::warn!("Reconciler task failed: {}", e);
    }

    tracing::info!("Dispatcher stopped");
    Ok(())
}
