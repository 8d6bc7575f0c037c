// Copyright (c) 2025 - Cowboy AI, Inc.
//! Outbox replay task
//!
//! Brings the service's bus traffic up and keeps the outbox draining:
//!
//! ```text
//! run()
//!  ├─ consumers: connect subscriber (forever) → subscribe every consumer
//!  └─ replay:    connect publisher (forever)  → every drain_interval: drain
//!
//! drain:  IDLE → (publisher down? WAITING_FOR_CONNECTION) → DRAINING → IDLE
//! ```
//!
//! Each outbox record is handled on its own: a record that cannot be
//! decoded or published stays in the store and never blocks the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::connection::RetryPolicy;
use crate::errors::{BusError, BusResult};
use crate::event_bus::EventBus;
use crate::events::DecodedEvent;
use crate::handlers::ConsumerRegistry;
use crate::outbox::{OutboxId, OutboxRecord, OutboxStore};

/// Default pause between drains
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(300);

/// Where the replay task is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    WaitingForConnection,
    Draining,
}

/// Replay task settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Pause between drains
    pub drain_interval: Duration,
    /// Spacing of connection attempts for both bus connections
    pub retry_policy: RetryPolicy,
    /// Stop republishing a record after this many failed publishes
    ///
    /// `None` retries forever. Counts are kept in memory and reset on
    /// restart; a quarantined record stays in the outbox.
    pub dead_letter_after: Option<u32>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            retry_policy: RetryPolicy::default(),
            dead_letter_after: None,
        }
    }
}

/// Outcome of one drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// The drain did not look at the outbox
    pub skipped: bool,
    pub published: usize,
    pub deleted: usize,
    /// Published records whose delete failed; they stay and are sent again
    pub delete_failed: usize,
    /// Publishes that failed; the records stay
    pub failed: usize,
    /// Records whose event could not be reconstructed; they stay
    pub unrecognized: usize,
    /// Records held back after too many failures; they stay
    pub quarantined: usize,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    /// Records looked at during the drain
    pub fn processed(&self) -> usize {
        self.published + self.failed + self.unrecognized + self.quarantined
    }
}

/// Drives consumer registration and outbox replay
pub struct ReplayTask {
    bus: Arc<EventBus>,
    store: Arc<dyn OutboxStore>,
    consumers: ConsumerRegistry,
    config: ReplayConfig,
    state: Mutex<ReplayState>,
    failures: Mutex<HashMap<OutboxId, u32>>,
    drain_lock: tokio::sync::Mutex<()>,
    shutdown: watch::Sender<bool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayTask {
    pub fn new(
        bus: Arc<EventBus>,
        store: Arc<dyn OutboxStore>,
        consumers: ConsumerRegistry,
        config: ReplayConfig,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            bus,
            store,
            consumers,
            config,
            state: Mutex::new(ReplayState::Idle),
            failures: Mutex::new(HashMap::new()),
            drain_lock: tokio::sync::Mutex::new(()),
            shutdown,
            timer: Mutex::new(None),
        })
    }

    pub fn state(&self) -> ReplayState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ReplayState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<OutboxId, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Failed publishes recorded for `id` since startup
    pub fn failure_count(&self, id: &OutboxId) -> u32 {
        self.failures().get(id).copied().unwrap_or(0)
    }

    /// Connect both sides of the bus, register consumers and start draining
    ///
    /// Both lanes run concurrently; neither waits for the other. Resolves
    /// once both are up, which with the default unbounded retries means
    /// "once the broker is reachable".
    ///
    /// # Errors
    ///
    /// The first lane failure, after both lanes finished. In practice this
    /// happens when [`dispose`](Self::dispose) interrupts the connect loops
    /// or a consumer subscription is rejected.
    pub async fn run(self: &Arc<Self>) -> BusResult<()> {
        let policy = self.config.retry_policy.clone();

        let consumers = async {
            self.bus.connect_subscriber(0, policy.clone()).await?;
            self.consumers.subscribe_all(&self.bus).await.map(|_| ())
        };

        let replay = async {
            self.set_state(ReplayState::WaitingForConnection);
            self.bus.connect_publisher(0, policy.clone()).await?;
            self.set_state(ReplayState::Idle);
            self.spawn_timer();
            Ok::<(), BusError>(())
        };

        let (consumers, replay) = tokio::join!(consumers, replay);
        consumers.and(replay)
    }

    fn spawn_timer(self: &Arc<Self>) {
        let mut slot = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_shut_down() || slot.as_ref().is_some_and(|timer| !timer.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown.subscribe();
        let period = self.config.drain_interval;

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                let Some(task) = weak.upgrade() else {
                    break;
                };
                task.drain_once().await;
            }
        }));
        info!(interval_secs = period.as_secs(), "Outbox replay scheduled");
    }

    /// Run one drain cycle now
    ///
    /// Waits for any drain already in progress.
    pub async fn drain_once(&self) -> DrainReport {
        let _guard = self.drain_lock.lock().await;

        if self.is_shut_down() {
            return DrainReport::skipped();
        }
        if !self.bus.is_publisher_connected() {
            self.set_state(ReplayState::WaitingForConnection);
            debug!("Publish connection down, skipping outbox drain");
            return DrainReport::skipped();
        }

        self.set_state(ReplayState::Draining);
        let records = match self.store.list().await {
            Ok(records) => records,
            Err(error) => {
                error!(error = %error, "Failed to list outbox records");
                self.set_state(ReplayState::Idle);
                return DrainReport::skipped();
            }
        };

        let mut report = DrainReport::default();
        for record in records {
            if self.is_shut_down() {
                break;
            }
            self.replay(record, &mut report).await;
        }
        self.set_state(ReplayState::Idle);

        if report.processed() > 0 {
            info!(
                published = report.published,
                deleted = report.deleted,
                delete_failed = report.delete_failed,
                failed = report.failed,
                unrecognized = report.unrecognized,
                quarantined = report.quarantined,
                "Outbox drain finished"
            );
        }
        report
    }

    async fn replay(&self, record: OutboxRecord, report: &mut DrainReport) {
        let event = record.to_event();

        match event.decode() {
            Ok(DecodedEvent::Known(_)) => {}
            Ok(DecodedEvent::Unknown { event_name }) => {
                warn!(
                    record_id = %record.id,
                    event_name = %event_name,
                    "Outbox record has an unknown event name, leaving it in place"
                );
                report.unrecognized += 1;
                return;
            }
            Err(error) => {
                warn!(
                    record_id = %record.id,
                    event_name = %event.event_name,
                    error = %error,
                    "Outbox record payload is unreadable, leaving it in place"
                );
                report.unrecognized += 1;
                return;
            }
        }

        if let Some(limit) = self.config.dead_letter_after {
            let failures = self.failure_count(&record.id);
            if failures >= limit {
                error!(
                    record_id = %record.id,
                    routing_key = %record.routing_key,
                    failures,
                    "Outbox record quarantined after repeated publish failures"
                );
                report.quarantined += 1;
                return;
            }
        }

        if let Err(error) = self.bus.publish(&event, &record.routing_key).await {
            let failures = {
                let mut counts = self.failures();
                let count = counts.entry(record.id.clone()).or_insert(0);
                *count += 1;
                *count
            };
            warn!(
                record_id = %record.id,
                routing_key = %record.routing_key,
                failures,
                error = %error,
                "Outbox republish failed, will retry next drain"
            );
            report.failed += 1;
            return;
        }

        report.published += 1;
        self.failures().remove(&record.id);

        match self.store.delete(&record.id).await {
            Ok(_) => {
                report.deleted += 1;
                debug!(record_id = %record.id, routing_key = %record.routing_key, "Outbox record delivered");
            }
            Err(error) => {
                // The event is out; a leftover record only means a duplicate
                // publish later, which consumers absorb.
                report.delete_failed += 1;
                error!(record_id = %record.id, error = %error, "Failed to delete delivered outbox record");
            }
        }
    }

    /// Stop draining and dispose the event bus
    ///
    /// When this returns no drain is running and none will start.
    pub async fn dispose(&self) {
        self.shutdown.send_replace(true);

        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            timer.abort();
            let _ = timer.await;
        }

        let _guard = self.drain_lock.lock().await;
        self.bus.dispose().await;
        self.set_state(ReplayState::Idle);
        info!("Replay task disposed");
    }
}
