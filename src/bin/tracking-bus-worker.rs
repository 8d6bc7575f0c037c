// Copyright (c) 2025 - Cowboy AI, Inc.
//! Tracking Bus Worker
//!
//! Runs the integration side of the tracking service:
//! - consumes activity, sleep and environment events from other services
//! - republishes events parked in the file-backed outbox
//!
//! Run with: cargo run --bin tracking-bus-worker
//!
//! Configuration comes from the environment (see `activity_tracking_bus::config`).
//! Measurements are kept in memory; a document-store repository plugs in
//! through `MeasurementRepository`.

use activity_tracking_bus::{
    domain::{Environment, PhysicalActivity, Sleep},
    repository::InMemoryRepository,
    BusConfig, ConsumerRegistry, CounterRegistry, EventBus,
    FileOutboxStore, MetricsSink, NatsConnector, Repositories, ReplayTask,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting tracking bus worker");

    let config = BusConfig::from_env().context("Invalid bus configuration")?;
    info!(
        servers = ?config.nats.servers,
        client = %config.nats.name,
        retry_interval_ms = config.retry_interval.as_millis() as u64,
        drain_interval_secs = config.drain_interval.as_secs(),
        outbox = %config.outbox_dir.display(),
        "Configuration loaded"
    );

    let bus = Arc::new(EventBus::new(
        Arc::new(NatsConnector::with_role(config.nats.clone(), "publish")),
        Arc::new(NatsConnector::with_role(config.nats.clone(), "subscribe")),
    ));
    bus.enable_logger(config.logger);

    let outbox = FileOutboxStore::open(&config.outbox_dir)
        .await
        .with_context(|| format!("Failed to open outbox at {}", config.outbox_dir.display()))?;

    let metrics = Arc::new(CounterRegistry::new());
    let repositories = Repositories {
        activities: Arc::new(InMemoryRepository::<PhysicalActivity>::new()),
        sleep: Arc::new(InMemoryRepository::<Sleep>::new()),
        environments: Arc::new(InMemoryRepository::<Environment>::new()),
    };
    let sink: Arc<dyn MetricsSink> = metrics.clone();
    let consumers = ConsumerRegistry::standard(&repositories, sink);

    let replay = ReplayTask::new(
        Arc::clone(&bus),
        Arc::new(outbox),
        consumers,
        config.replay_config(),
    );

    let running = {
        let replay = Arc::clone(&replay);
        tokio::spawn(async move {
            match replay.run().await {
                Ok(()) => info!("Bus connected, consumers and outbox replay running"),
                Err(error) => error!(error = %error, "Bus startup stopped"),
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    replay.dispose().await;
    running.await.context("Startup task panicked")?;

    for (counter, total) in metrics.snapshot() {
        info!(counter = %counter, total, "Final count");
    }
    info!("Tracking bus worker stopped");
    Ok(())
}
