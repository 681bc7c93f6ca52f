//! Quill Worker
//!
//! A long-running worker that polls a job server over gRPC, runs each job
//! through a text-generation backend and reports the result back.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Client: gRPC session with the job server (see `quill-client`)
//! - Services: Job processing (task executor, inference backend)
//! - Scheduler: Worker loop and its run/stop lifecycle
//!
//! The worker handles one job at a time. It runs until interrupted, then
//! finishes the call in flight, releases its channel and exits.

mod config;
mod scheduler;
mod service;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, error, info};
use tracing_subscriber::layer::SubscriberExt;

use crate::config::WorkerConfig;
use crate::scheduler::WorkerLoop;
use crate::service::{InferenceBackend, PlaceholderBackend, StandardTaskExecutor, TaskExecutor};
use quill_client::JobClient;

#[tokio::main]
async fn main() -> Result<()> {
    // The logger is handed to the worker explicitly rather than installed
    // as the process-wide default.
    let dispatch: Dispatch = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill_worker=info,quill_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .into();

    run().with_subscriber(dispatch).await
}

async fn run() -> Result<()> {
    info!("Starting Quill Worker");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Worker failed with error: {:#}", e);
            return Err(e);
        }
    };
    info!(
        "Loaded configuration: worker_id={}, server_address={}",
        config.worker_id, config.server_address
    );

    let client = match JobClient::connect_grpc(&config.server_address, &config.client_options())
        .context("Failed to create job server client")
    {
        Ok(client) => client,
        Err(e) => {
            error!("Worker failed with error: {:#}", e);
            return Err(e);
        }
    };

    info!("Job server client initialized");

    let backend: Arc<dyn InferenceBackend> =
        Arc::new(PlaceholderBackend::new(config.model.clone()));
    let executor: Arc<dyn TaskExecutor> =
        Arc::new(StandardTaskExecutor::new(backend, config.generation_params()));

    info!("Services initialized");

    let mut worker = WorkerLoop::new(config, client, executor);

    let stop = worker.stop_handle();
    let signals = tokio::spawn(
        async move {
            shutdown_signal().await;
            info!("Worker interrupted, shutting down");
            stop.stop();
        }
        .with_current_subscriber(),
    );

    worker.run().await;

    worker.stop();
    signals.abort();
    info!("Worker shut down");

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<WorkerConfig> {
    let config = WorkerConfig::from_env();
    config.validate().context("Invalid worker configuration")?;
    Ok(config)
}

/// Resolves on the first SIGINT or SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for interrupt signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for terminate signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
