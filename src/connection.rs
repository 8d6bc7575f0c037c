// Copyright (c) 2025 - Cowboy AI, Inc.
//! Connection manager
//!
//! Owns one broker connection for one role (publish or subscribe) and keeps
//! it alive:
//!
//! ```text
//! DISCONNECTED ──try_connect──> CONNECTING ──ok──> CONNECTED
//!                                   ↑  │ err: wait, retry    │
//!                                   └──┘                     │ broker drops link
//!                                   ↑                        ↓
//!                                   └──── watchdog ──── DISCONNECTED
//! ```
//!
//! After the first successful connect a watchdog task polls the link. When
//! the broker reports the link lost, the watchdog reconnects with the same
//! retry policy and bumps the connection generation so subscribers can
//! re-bind on the new link.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::{BrokerConnection, BrokerConnector, LinkStatus};
use crate::errors::{BusError, BusResult, ConnectionRole};

/// Observable state of a connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in progress
    Disconnected,
    /// Attempting to (re)connect
    Connecting,
    /// Connected and usable
    Connected,
}

/// Delay between connection attempts
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// Same delay after every failed attempt
    Fixed(Duration),
    /// Delay grows by `multiplier` per failed attempt, capped at `max`
    Exponential {
        /// Delay after the first failure
        initial: Duration,
        /// Upper bound on any single delay
        max: Duration,
        /// Growth factor per attempt
        multiplier: u32,
    },
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failure (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::Fixed(interval) => *interval,
            RetryPolicy::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1);
                let factor = multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
                initial.checked_mul(factor).unwrap_or(*max).min(*max)
            }
        }
    }

    /// Shortest delay this policy produces; the watchdog polls at this rate
    pub fn base_delay(&self) -> Duration {
        match self {
            RetryPolicy::Fixed(interval) => *interval,
            RetryPolicy::Exponential { initial, .. } => *initial,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed(Duration::from_millis(1500))
    }
}

/// Owns and supervises a single broker connection
pub struct ConnectionManager {
    role: ConnectionRole,
    connector: Arc<dyn BrokerConnector>,
    connection: RwLock<Option<Arc<dyn BrokerConnection>>>,
    connecting: AtomicBool,
    connect_lock: tokio::sync::Mutex<()>,
    generation: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a manager that opens connections through `connector`
    pub fn new(role: ConnectionRole, connector: Arc<dyn BrokerConnector>) -> Arc<Self> {
        let (generation, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);

        Arc::new(Self {
            role,
            connector,
            connection: RwLock::new(None),
            connecting: AtomicBool::new(false),
            connect_lock: tokio::sync::Mutex::new(()),
            generation,
            shutdown,
            watchdog: Mutex::new(None),
        })
    }

    /// Role this manager serves
    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Connect with a fixed delay between attempts
    ///
    /// `max_retries = 0` retries forever.
    pub async fn try_connect(self: &Arc<Self>, max_retries: u32, interval: Duration) -> BusResult<()> {
        self.try_connect_with(max_retries, RetryPolicy::Fixed(interval))
            .await
    }

    /// Connect using `policy` to space out attempts
    ///
    /// `max_retries` bounds the total number of attempts; `0` means no bound.
    /// Resolves immediately if already connected.
    ///
    /// # Errors
    ///
    /// `BusError::Connection` when the attempt budget is exhausted or the
    /// manager is closed while retrying.
    pub async fn try_connect_with(
        self: &Arc<Self>,
        max_retries: u32,
        policy: RetryPolicy,
    ) -> BusResult<()> {
        let _guard = self.connect_lock.lock().await;

        if self.is_closed() {
            return Err(self.closed_error());
        }
        if self.is_connected() {
            return Ok(());
        }

        self.connecting.store(true, Ordering::SeqCst);
        let result = self.connect_loop(max_retries, &policy).await;
        self.connecting.store(false, Ordering::SeqCst);

        let connection = result?;
        self.install(connection);
        self.spawn_watchdog(policy);
        Ok(())
    }

    async fn connect_loop(
        &self,
        max_retries: u32,
        policy: &RetryPolicy,
    ) -> BusResult<Arc<dyn BrokerConnection>> {
        let mut shutdown = self.shutdown.subscribe();
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return Err(self.closed_error());
            }
            attempt = attempt.saturating_add(1);

            let result = tokio::select! {
                result = self.connector.connect() => result,
                _ = wait_closed(&mut shutdown) => return Err(self.closed_error()),
            };

            let error = match result {
                Ok(connection) => {
                    info!(
                        role = %self.role,
                        target = %self.connector.target(),
                        attempt,
                        "Broker connection established"
                    );
                    return Ok(connection);
                }
                Err(error) => error,
            };

            if max_retries > 0 && attempt >= max_retries {
                return Err(BusError::Connection(format!(
                    "{} connection to {} failed after {} attempts: {}",
                    self.role,
                    self.connector.target(),
                    attempt,
                    error
                )));
            }

            let delay = policy.delay_after(attempt);
            warn!(
                role = %self.role,
                target = %self.connector.target(),
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Broker connection failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_closed(&mut shutdown) => return Err(self.closed_error()),
            }
        }
    }

    fn install(&self, connection: Arc<dyn BrokerConnection>) {
        *self.connection.write().unwrap_or_else(PoisonError::into_inner) = Some(connection);
        self.generation.send_modify(|generation| *generation += 1);
    }

    fn spawn_watchdog(self: &Arc<Self>, policy: RetryPolicy) {
        let mut slot = self.watchdog.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(self);
        let poll = policy.base_delay().max(Duration::from_millis(10));

        *slot = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll).await;

                let Some(manager) = weak.upgrade() else {
                    break;
                };
                if manager.is_closed() {
                    break;
                }
                if manager.link_status() != Some(LinkStatus::Lost) {
                    continue;
                }

                warn!(role = %manager.role, "Broker connection lost, reconnecting");
                if let Err(error) = manager.reconnect(&policy).await {
                    debug!(role = %manager.role, error = %error, "Watchdog stopped");
                    break;
                }
            }
        }));
    }

    async fn reconnect(&self, policy: &RetryPolicy) -> BusResult<()> {
        let _guard = self.connect_lock.lock().await;

        let stale = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(stale) = stale {
            stale.close().await;
        }

        self.connecting.store(true, Ordering::SeqCst);
        let result = self.connect_loop(0, policy).await;
        self.connecting.store(false, Ordering::SeqCst);

        self.install(result?);
        Ok(())
    }

    fn link_status(&self) -> Option<LinkStatus> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|connection| connection.status())
    }

    /// Current state, derived from the live link on every call
    pub fn state(&self) -> ConnectionState {
        if self.is_closed() {
            return ConnectionState::Disconnected;
        }
        match self.link_status() {
            Some(LinkStatus::Up) => ConnectionState::Connected,
            Some(LinkStatus::Recovering) => ConnectionState::Connecting,
            _ if self.connecting.load(Ordering::SeqCst) => ConnectionState::Connecting,
            _ => ConnectionState::Disconnected,
        }
    }

    /// True only while the link is up
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The live connection, if connected
    pub fn connection(&self) -> Option<Arc<dyn BrokerConnection>> {
        if !self.is_connected() {
            return None;
        }
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver that changes every time a new connection is installed
    pub fn generations(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Cancel retries, stop the watchdog and close the connection
    pub async fn close(&self) {
        self.shutdown.send_replace(true);

        let watchdog = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let connection = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(connection) = connection {
            connection.close().await;
        }

        // Wake anyone waiting for a new generation so they observe the close.
        self.generation.send_modify(|generation| *generation += 1);
        info!(role = %self.role, "Connection manager closed");
    }

    fn closed_error(&self) -> BusError {
        BusError::Connection(format!("{} connection manager is closed", self.role))
    }
}

async fn wait_closed(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use pretty_assertions::assert_eq;

    fn manager(broker: &MemoryBroker) -> Arc<ConnectionManager> {
        ConnectionManager::new(ConnectionRole::Publish, Arc::new(broker.clone()))
    }

    #[test]
    fn test_fixed_policy_is_constant() {
        let policy = RetryPolicy::Fixed(Duration::from_millis(1500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1500));
        assert_eq!(policy.delay_after(50), Duration::from_millis(1500));
    }

    #[test]
    fn test_exponential_policy_grows_and_caps() {
        let policy = RetryPolicy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            multiplier: 2,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
        assert_eq!(policy.delay_after(5), Duration::from_secs(1));
        assert_eq!(policy.delay_after(40), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.connection().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let broker = MemoryBroker::unreachable();
        let manager = manager(&broker);

        let result = manager.try_connect(3, Duration::from_millis(100)).await;

        assert!(matches!(result, Err(BusError::Connection(_))));
        assert_eq!(broker.connect_attempts(), 3);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_drop_is_visible_immediately() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.try_connect(1, Duration::from_millis(100)).await.unwrap();
        assert!(manager.is_connected());

        broker.drop_connections();

        assert!(!manager.is_connected());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_reconnects_after_drop() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.try_connect(0, Duration::from_millis(100)).await.unwrap();
        let mut generations = manager.generations();
        let first = *generations.borrow_and_update();

        broker.drop_connections();
        generations.changed().await.unwrap();

        assert!(*generations.borrow() > first);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_infinite_retry() {
        let broker = MemoryBroker::unreachable();
        let manager = manager(&broker);

        let connecting = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.try_connect(0, Duration::from_millis(100)).await })
        };
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.close().await;

        let result = connecting.await.unwrap();
        assert!(matches!(result, Err(BusError::Connection(_))));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager
            .try_connect(1, Duration::from_millis(100))
            .await
            .is_err());
    }
}
