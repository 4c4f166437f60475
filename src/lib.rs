//! Boutique Insights -- two-tier health checks and failure prediction for
//! LLM-powered storefront services.
//!
//! This crate provides the core library for metric reads, threshold checks,
//! deep analysis through a reasoning model, alert emission, scheduling, and
//! response scoring.

pub mod alert;
pub mod api;
pub mod backend;
pub mod config;
pub mod detect;
pub mod insights;
pub mod metrics;
pub mod scheduler;
pub mod scoring;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::backend::{DatadogClient, MetricsBackend, SignalSink};
use crate::config::InsightsConfig;
use crate::insights::InsightsService;
use crate::store::InMemoryStore;

/// Build the insights facade from configuration.
pub fn build_service(config: &InsightsConfig) -> Result<InsightsService> {
    let client = Arc::new(
        DatadogClient::from_config(&config.backend).context("failed to build backend client")?,
    );
    let backend: Arc<dyn MetricsBackend> = client.clone();
    let sink: Arc<dyn SignalSink> = client;
    let model = detect::model::from_config(&config.analysis);
    Ok(InsightsService::new(backend, sink, model, config))
}

/// Start the insights daemon: API server and scheduler.
pub async fn serve(config: InsightsConfig) -> Result<()> {
    // 1. Initialize the service graph
    let insights = build_service(&config)?;
    match insights.backend_status().await {
        Ok(()) => tracing::info!("backend credentials validated"),
        Err(e) => tracing::warn!(error = %e, "backend validation failed, continuing degraded"),
    }

    // 2. Initialize Scheduler
    let scheduler = scheduler::Scheduler::new(Arc::new(InMemoryStore::new()));
    scheduler::profiles::register_defaults(&scheduler, &insights, &config.schedule)
        .context("failed to register scheduled jobs")?;

    // 3. Start Scheduler Engine (background task)
    let shutdown = CancellationToken::new();
    let scheduler_engine = scheduler.clone();
    let tick = config.schedule.tick();
    let engine_shutdown = shutdown.clone();
    let engine = tokio::spawn(async move {
        scheduler::run_scheduler_loop(scheduler_engine, tick, engine_shutdown).await;
    });

    // 4. Start API Server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    let state = api::state::AppState {
        insights,
        scheduler,
        config: Arc::new(config),
    };
    let app = api::router(state);

    tracing::info!(%addr, "insights service listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    join_engine(engine).await;
    Ok(())
}

/// Wait for the scheduler engine. Returns `false` when it did not exit cleanly.
async fn join_engine(engine: tokio::task::JoinHandle<()>) -> bool {
    match engine.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, panicked = e.is_panic(), "scheduler engine task failed");
            false
        }
    }
}
