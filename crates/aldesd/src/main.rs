use std::path::PathBuf;
use std::sync::Arc;

use aldesd::Config;
use aldesd::Engine;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Home-automation daemon exposing AldesConnect thermostat temperatures
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "aldesd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.targets())
        .init();

    tracing::info!("aldesd starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let mut engine = Engine::new();
    engine.register_integrations_from_config(&config);
    let engine = Arc::new(engine);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_handle = if config.api.enabled {
        let engine = engine.clone();
        let listen = config.api.listen.clone();
        let port = config.api.port;
        Some(tokio::spawn(async move {
            if let Err(e) = aldesd::api::serve(listen, port, engine, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        }))
    } else {
        tracing::info!("HTTP API disabled");
        None
    };

    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Engine failed: {}", e);
            }
        })
    };

    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    if let Some(handle) = api_handle {
        shutdown_tx.send(()).ok();
        handle.await.ok();
    }

    tracing::info!("Shutting down integrations...");
    engine.close().await;
    engine_task.abort();

    tracing::info!("aldesd shutdown complete");

    Ok(())
}
