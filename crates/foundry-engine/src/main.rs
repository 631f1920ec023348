//! Coordinating binary for the Foundry tracking core.
//!
//! This is the main entry point that wires together the session
//! registry, progress aggregator, event broadcaster, and health
//! monitoring, then runs the NATS transport adapters that bridge
//! pipeline workers and observers to the core until shutdown.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `foundry-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the event broadcaster
//! 4. Create the session registry and progress aggregator
//! 5. Spawn the registry prune loop
//! 6. Create the health sampler with HTTP probes and spawn its loop
//! 7. Spawn the periodic health report logger
//! 8. Connect to NATS and run the pipeline ingest adapter
//! 9. Wait for ctrl-c, then stop the background loops

mod error;
mod http_probe;
mod ingest;
mod metrics;
mod relay;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use foundry_broadcast::SessionBroadcaster;
use foundry_core::{EventPublisher, FoundryConfig, ProgressAggregator, SessionRegistry};
use foundry_health::{HealthMonitor, HealthSampler, SampleStore};
use foundry_types::{HealthStatus, ServiceName};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::http_probe::HttpProbe;
use crate::ingest::PipelineIngest;
use crate::metrics::EngineMetricsSource;

/// Application entry point for the Foundry engine.
///
/// # Errors
///
/// Returns an error if configuration or subsystem construction fails.
/// A missing NATS server is not fatal: the engine degrades to
/// standalone mode with the health loops still running.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config = load_config().context("configuration failed validation")?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(true)
        .init();

    info!("foundry-engine starting");
    info!(
        services = config.health.services.len(),
        sample_interval_secs = config.health.sample_interval_secs,
        idle_ttl_secs = config.pipeline.idle_ttl_secs,
        queue_capacity = config.broadcast.queue_capacity,
        "Configuration loaded"
    );

    // 3. Create the event broadcaster.
    let broadcaster = SessionBroadcaster::new(config.broadcast.queue_capacity);
    info!("Event broadcaster created");

    // 4. Create the session registry and progress aggregator.
    let registry = Arc::new(SessionRegistry::new(
        Arc::clone(&broadcaster) as Arc<dyn EventPublisher>,
        &config.pipeline,
    ));
    let aggregator = Arc::new(ProgressAggregator::new(
        Arc::clone(&registry),
        Arc::clone(&broadcaster) as Arc<dyn EventPublisher>,
        config.pipeline.clone(),
    ));
    info!("Session registry and aggregator created");

    // 5. Spawn the registry prune loop.
    let prune_handle = registry.spawn_prune_loop();
    info!(
        prune_interval_secs = config.pipeline.prune_interval_secs,
        "Prune loop started"
    );

    // 6. Create the health sampler with one HTTP probe per configured
    //    service, and spawn the sampling loop.
    let store = Arc::new(SampleStore::new(config.health.window_size));
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.health.probe_timeout_ms))
        .build()
        .context("failed to build HTTP probe client")?;
    let mut sampler = HealthSampler::new(Arc::clone(&store), &config.health);
    for endpoint in &config.health.services {
        sampler.register(
            ServiceName::new(endpoint.name.clone()),
            Arc::new(HttpProbe::new(
                http.clone(),
                endpoint.url.clone(),
                config.health.degraded_response_time_ms,
            )),
        );
    }
    let sampler_handle = Arc::new(sampler).spawn_sampler_loop();
    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&store),
        config.health.clone(),
    ));
    info!(
        services = config.health.services.len(),
        "Health sampler started"
    );

    // 7. Spawn the periodic health report logger.
    let metrics_source = Arc::new(EngineMetricsSource::new(
        Arc::clone(&registry),
        Arc::clone(&broadcaster),
        config.health.services.len(),
    ));
    let report_handle = spawn_report_loop(
        Arc::clone(&monitor),
        Arc::clone(&metrics_source),
        config.health.sample_interval_secs,
    );

    // 8. Connect to NATS and run the pipeline ingest adapter. A missing
    //    server degrades to standalone mode rather than aborting.
    let nats_url = &config.infrastructure.nats_url;
    info!(nats_url = nats_url, "Connecting to NATS");
    let ingest_handle = match async_nats::connect(nats_url).await {
        Ok(client) => {
            let ingest = PipelineIngest::new(
                client,
                Arc::clone(&registry),
                Arc::clone(&aggregator),
                Arc::clone(&broadcaster),
            );
            Some(tokio::spawn(async move {
                if let Err(e) = ingest.run().await {
                    warn!(error = %e, "pipeline ingest stopped");
                }
            }))
        }
        Err(e) => {
            warn!(
                nats_url = nats_url,
                error = %e,
                "NATS unavailable, running standalone (no ingest or relay)"
            );
            None
        }
    };

    // 9. Run until ctrl-c, then stop the background loops.
    info!("foundry-engine running, ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutdown signal received");
    prune_handle.abort();
    sampler_handle.abort();
    report_handle.abort();
    if let Some(handle) = ingest_handle {
        handle.abort();
    }

    info!("foundry-engine shutdown complete");
    Ok(())
}

/// Load configuration from `foundry-config.yaml`.
///
/// Looks for the config file relative to the current working directory
/// and falls back to defaults when it is absent.
fn load_config() -> Result<FoundryConfig, EngineError> {
    let config_path = Path::new("foundry-config.yaml");
    if config_path.exists() {
        let config = FoundryConfig::from_file(config_path)?;
        Ok(config)
    } else {
        let mut config = FoundryConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}

/// Spawn the loop that logs a health summary every sampling interval.
///
/// Quiet while everything is healthy; an unhealthy or degraded overall
/// status logs the full report's recommendations.
fn spawn_report_loop(
    monitor: Arc<HealthMonitor>,
    metrics: Arc<EngineMetricsSource>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // Skip the immediate first tick; no samples exist yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let quick = monitor.quick_status().await;
            if quick.status == HealthStatus::Healthy {
                info!(status = %quick.status, summary = quick.summary, "health check");
                continue;
            }

            let report = monitor.compose_report(metrics.as_ref()).await;
            warn!(
                overall = %report.overall,
                services = report.services.len(),
                active_sessions = report.system_metrics.active_sessions,
                "health degraded"
            );
            for recommendation in &report.recommendations {
                warn!(%recommendation, "health recommendation");
            }
        }
    })
}
