// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration event bus
//!
//! Publish/subscribe client over two independent broker connections, so a
//! stalled publisher never blocks consumers and vice versa:
//!
//! ```text
//!                 ┌──────────── EventBus ─────────────┐
//!  publish() ───> │ ConnectionManager (publish)       │ ───> broker
//!                 │                                   │
//!  handler  <──── │ ConnectionManager (subscribe)     │ <─── broker
//!                 │   └─ one dispatcher per binding   │
//!                 └───────────────────────────────────┘
//! ```
//!
//! Operations fail fast with [`BusError::NotConnected`] while the needed
//! connection is down; nothing is queued here. Callers that need eventual
//! delivery go through [`OutboxPublisher`](crate::outbox::OutboxPublisher).

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::{BrokerConnector, MessageStream};
use crate::connection::{ConnectionManager, ConnectionState, RetryPolicy};
use crate::errors::{BusError, BusResult, ConnectionRole};
use crate::events::{EventName, IntegrationEvent};

/// Receives events delivered on a subscribed routing key
///
/// Implementations must not fail: whatever goes wrong is logged inside and
/// the message counts as handled.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: IntegrationEvent);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Binding {
    event_name: EventName,
    routing_key: String,
}

/// Publish/subscribe client
pub struct EventBus {
    publisher: Arc<ConnectionManager>,
    subscriber: Arc<ConnectionManager>,
    bindings: Mutex<HashMap<Binding, JoinHandle<()>>>,
    logger: Arc<AtomicBool>,
    disposed: AtomicBool,
}

impl EventBus {
    /// Create a bus whose two sides connect through the given connectors
    pub fn new(
        publish_connector: Arc<dyn BrokerConnector>,
        subscribe_connector: Arc<dyn BrokerConnector>,
    ) -> Self {
        Self {
            publisher: ConnectionManager::new(ConnectionRole::Publish, publish_connector),
            subscriber: ConnectionManager::new(ConnectionRole::Subscribe, subscribe_connector),
            bindings: Mutex::new(HashMap::new()),
            logger: Arc::new(AtomicBool::new(false)),
            disposed: AtomicBool::new(false),
        }
    }

    fn bindings(&self) -> MutexGuard<'_, HashMap<Binding, JoinHandle<()>>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(&self) -> BusResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(BusError::Connection("event bus has been disposed".to_string()))
        } else {
            Ok(())
        }
    }

    fn logging(&self) -> bool {
        self.logger.load(Ordering::Relaxed)
    }

    /// Toggle diagnostic logging of bus traffic
    pub fn enable_logger(&self, enabled: bool) {
        self.logger.store(enabled, Ordering::Relaxed);
    }

    /// Connect the publish side; `max_retries = 0` retries forever
    pub async fn connect_publisher(&self, max_retries: u32, policy: RetryPolicy) -> BusResult<()> {
        self.ensure_live()?;
        self.publisher.try_connect_with(max_retries, policy).await
    }

    /// Connect the subscribe side; `max_retries = 0` retries forever
    pub async fn connect_subscriber(&self, max_retries: u32, policy: RetryPolicy) -> BusResult<()> {
        self.ensure_live()?;
        self.subscriber.try_connect_with(max_retries, policy).await
    }

    pub fn publisher_state(&self) -> ConnectionState {
        self.publisher.state()
    }

    pub fn subscriber_state(&self) -> ConnectionState {
        self.subscriber.state()
    }

    pub fn is_publisher_connected(&self) -> bool {
        !self.is_disposed() && self.publisher.is_connected()
    }

    pub fn is_subscriber_connected(&self) -> bool {
        !self.is_disposed() && self.subscriber.is_connected()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Publish `event` on `routing_key`
    ///
    /// Resolves `true` once the broker has acknowledged the message.
    ///
    /// # Errors
    ///
    /// - [`BusError::NotConnected`] when the publish connection is down
    /// - [`BusError::Connection`] after [`dispose`](Self::dispose), or if the
    ///   link drops mid-publish
    /// - [`BusError::Publish`] when the broker rejects the message
    pub async fn publish(&self, event: &IntegrationEvent, routing_key: &str) -> BusResult<bool> {
        self.ensure_live()?;

        let connection = self.publisher.connection().ok_or(BusError::NotConnected {
            role: ConnectionRole::Publish,
        })?;

        connection.publish(routing_key, event.to_bytes()).await?;

        if self.logging() {
            info!(
                routing_key = %routing_key,
                event_name = %event.event_name,
                "Event published"
            );
        }
        Ok(true)
    }

    /// Deliver every `event_name` message on `routing_key` to `handler`
    ///
    /// Binding the same `(event_name, routing_key)` pair twice is a no-op
    /// that still resolves `true`.
    ///
    /// # Errors
    ///
    /// - [`BusError::NotConnected`] when the subscribe connection is down
    /// - [`BusError::Connection`] after [`dispose`](Self::dispose)
    /// - [`BusError::Subscribe`] when the broker rejects the subscription
    pub async fn subscribe(
        &self,
        event_name: EventName,
        handler: Arc<dyn EventHandler>,
        routing_key: &str,
    ) -> BusResult<bool> {
        self.ensure_live()?;

        let binding = Binding {
            event_name,
            routing_key: routing_key.to_string(),
        };
        if self
            .bindings()
            .get(&binding)
            .is_some_and(|task| !task.is_finished())
        {
            debug!(routing_key = %routing_key, event_name = %event_name, "Already subscribed");
            return Ok(true);
        }

        let connection = self.subscriber.connection().ok_or(BusError::NotConnected {
            role: ConnectionRole::Subscribe,
        })?;
        let stream = connection.subscribe(routing_key).await?;

        let dispatcher = Dispatcher {
            binding: binding.clone(),
            handler,
            manager: Arc::clone(&self.subscriber),
            logger: Arc::clone(&self.logger),
        };
        let task = tokio::spawn(dispatcher.run(stream));

        let mut bindings = self.bindings();
        if bindings
            .get(&binding)
            .is_some_and(|existing| !existing.is_finished())
        {
            // Lost a race with a concurrent subscribe for the same binding.
            task.abort();
            return Ok(true);
        }
        bindings.insert(binding, task);
        drop(bindings);

        if self.logging() {
            info!(routing_key = %routing_key, event_name = %event_name, "Subscribed");
        }
        Ok(true)
    }

    /// Number of active bindings
    pub fn subscription_count(&self) -> usize {
        self.bindings()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Close both connections and stop every dispatcher
    ///
    /// Idempotent. Afterwards `publish` and `subscribe` fail with
    /// [`BusError::Connection`].
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let tasks: Vec<_> = self.bindings().drain().map(|(_, task)| task).collect();
        for task in tasks {
            task.abort();
        }

        self.publisher.close().await;
        self.subscriber.close().await;
        info!("Event bus disposed");
    }
}

struct Dispatcher {
    binding: Binding,
    handler: Arc<dyn EventHandler>,
    manager: Arc<ConnectionManager>,
    logger: Arc<AtomicBool>,
}

impl Dispatcher {
    async fn run(self, mut stream: MessageStream) {
        let mut generations = self.manager.generations();

        loop {
            while let Some(body) = stream.next().await {
                self.deliver(&body).await;
            }

            if self.manager.is_closed() {
                return;
            }
            warn!(
                routing_key = %self.binding.routing_key,
                "Subscription stream ended, waiting for a new connection"
            );

            stream = loop {
                if generations.changed().await.is_err() || self.manager.is_closed() {
                    return;
                }
                let Some(connection) = self.manager.connection() else {
                    continue;
                };
                match connection.subscribe(&self.binding.routing_key).await {
                    Ok(stream) => {
                        info!(routing_key = %self.binding.routing_key, "Subscription restored");
                        break stream;
                    }
                    Err(error) => {
                        warn!(
                            routing_key = %self.binding.routing_key,
                            error = %error,
                            "Resubscribe failed"
                        );
                    }
                }
            };
        }
    }

    async fn deliver(&self, body: &[u8]) {
        let event = match IntegrationEvent::from_slice(body) {
            Ok(event) => event,
            Err(error) => {
                warn!(
                    routing_key = %self.binding.routing_key,
                    error = %error,
                    "Dropping message that is not an integration event"
                );
                return;
            }
        };

        if event.event_name != self.binding.event_name.as_str() {
            debug!(
                routing_key = %self.binding.routing_key,
                expected = %self.binding.event_name,
                received = %event.event_name,
                "Ignoring event for a different binding"
            );
            return;
        }

        if self.logger.load(Ordering::Relaxed) {
            debug!(
                routing_key = %self.binding.routing_key,
                event_name = %event.event_name,
                "Delivering event"
            );
        }
        self.handler.handle(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use chrono::Utc;
    use std::time::Duration;

    struct Recorder(Mutex<Vec<IntegrationEvent>>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: IntegrationEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn bus(broker: &MemoryBroker) -> EventBus {
        EventBus::new(Arc::new(broker.clone()), Arc::new(broker.clone()))
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_fails_fast() {
        let broker = MemoryBroker::new();
        let bus = bus(&broker);
        let event = IntegrationEvent::new("SleepSaveEvent", Utc::now());

        let result = bus.publish(&event, "sleep.save").await;

        assert!(matches!(
            result,
            Err(BusError::NotConnected {
                role: ConnectionRole::Publish
            })
        ));
        assert_eq!(broker.publish_attempts(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_fails_fast() {
        let broker = MemoryBroker::new();
        let bus = bus(&broker);
        let handler = Arc::new(Recorder(Mutex::new(Vec::new())));

        let result = bus.subscribe(EventName::SleepSave, handler, "sleep.save").await;

        assert!(result.unwrap_err().is_not_connected());
    }

    #[tokio::test]
    async fn test_foreign_event_names_are_not_delivered() {
        let broker = MemoryBroker::new();
        let bus = bus(&broker);
        bus.connect_subscriber(1, RetryPolicy::default()).await.unwrap();
        let handler = Arc::new(Recorder(Mutex::new(Vec::new())));
        bus.subscribe(EventName::SleepSave, handler.clone(), "sleep.save")
            .await
            .unwrap();

        broker.inject("sleep.save", b"not json".to_vec());
        broker.inject(
            "sleep.save",
            IntegrationEvent::new("SleepDeleteEvent", Utc::now()).to_bytes(),
        );
        broker.inject(
            "sleep.save",
            IntegrationEvent::new("SleepSaveEvent", Utc::now()).to_bytes(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let received = handler.0.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].event_name, "SleepSaveEvent");
    }

    #[tokio::test]
    async fn test_logger_toggle_does_not_change_delivery() {
        let broker = MemoryBroker::new();
        let bus = bus(&broker);
        bus.enable_logger(true);
        bus.connect_publisher(1, RetryPolicy::default()).await.unwrap();

        let event = IntegrationEvent::new("SleepSaveEvent", Utc::now());
        assert!(bus.publish(&event, "sleep.save").await.unwrap());

        bus.enable_logger(false);
        assert!(bus.publish(&event, "sleep.save").await.unwrap());
        assert_eq!(broker.published_to("sleep.save").len(), 2);
    }
}
