// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-process broker
//!
//! Routes messages between connections opened from the same [`MemoryBroker`]
//! handle and records everything published. Faults can be injected to
//! exercise the retry, fail-fast and outbox paths without a NATS server:
//!
//! - refuse the first N connection attempts, or all of them
//! - fail every publish, or only publishes to chosen routing keys
//! - delay publishes to widen race windows
//! - drop all live connections as if the server went away

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{BrokerConnection, BrokerConnector, BrokerError, LinkStatus, MessageStream};

/// A message accepted by the broker
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    /// Routing key it was published on
    pub routing_key: String,
    /// Raw body
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Body decoded as JSON, `Null` if it is not JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Default)]
struct MemoryState {
    reachable: bool,
    refuse_connects: u32,
    connect_attempts: u32,
    fail_publishes: bool,
    failing_routing_keys: HashSet<String>,
    publish_delay: Option<Duration>,
    publish_attempts: u64,
    published: Vec<PublishedMessage>,
    topics: HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>,
    generation: u64,
}

/// Shared handle to an in-process broker
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// A reachable broker with no faults
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                reachable: true,
                ..Default::default()
            })),
        }
    }

    /// A broker that refuses every connection until [`set_reachable`](Self::set_reachable)
    pub fn unreachable() -> Self {
        let broker = Self::new();
        broker.set_reachable(false);
        broker
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse the next `count` connection attempts
    pub fn refuse_connects(&self, count: u32) {
        self.lock().refuse_connects = count;
    }

    /// Toggle reachability; going unreachable also drops live connections
    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.lock();
        state.reachable = reachable;
        if !reachable {
            state.generation += 1;
            state.topics.clear();
        }
    }

    /// Simulate the broker closing every open connection
    pub fn drop_connections(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.topics.clear();
    }

    /// Make every publish fail
    pub fn set_fail_publishes(&self, fail: bool) {
        self.lock().fail_publishes = fail;
    }

    /// Make publishes to one routing key fail
    pub fn fail_routing_key(&self, routing_key: impl Into<String>) {
        self.lock().failing_routing_keys.insert(routing_key.into());
    }

    /// Delay every publish by `delay` before it is accepted
    pub fn set_publish_delay(&self, delay: Option<Duration>) {
        self.lock().publish_delay = delay;
    }

    /// Number of connection attempts seen so far
    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    /// Number of publish calls that reached the broker, accepted or not
    pub fn publish_attempts(&self) -> u64 {
        self.lock().publish_attempts
    }

    /// Every accepted message, in order
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Accepted messages for one routing key
    pub fn published_to(&self, routing_key: &str) -> Vec<PublishedMessage> {
        self.lock()
            .published
            .iter()
            .filter(|message| message.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Number of live subscriptions on a routing key
    pub fn subscriber_count(&self, routing_key: &str) -> usize {
        self.lock()
            .topics
            .get(routing_key)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Deliver a message to subscribers as if another service had published it
    pub fn inject(&self, routing_key: &str, payload: Vec<u8>) -> usize {
        let mut state = self.lock();
        fan_out(&mut state, routing_key, &payload)
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }
}

fn fan_out(state: &mut MemoryState, routing_key: &str, payload: &[u8]) -> usize {
    let Some(senders) = state.topics.get_mut(routing_key) else {
        return 0;
    };
    senders.retain(|tx| tx.send(payload.to_vec()).is_ok());
    senders.len()
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
        let generation = {
            let mut state = self.lock();
            state.connect_attempts += 1;

            if !state.reachable {
                return Err(BrokerError::Connect("broker unreachable".to_string()));
            }
            if state.refuse_connects > 0 {
                state.refuse_connects -= 1;
                return Err(BrokerError::Connect("connection refused".to_string()));
            }
            state.generation
        };

        Ok(Arc::new(MemoryConnection {
            broker: self.clone(),
            generation,
            closed: AtomicBool::new(false),
        }))
    }

    fn target(&self) -> String {
        "memory://local".to_string()
    }
}

struct MemoryConnection {
    broker: MemoryBroker,
    generation: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn is_alive(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let state = self.broker.lock();
        state.reachable && state.generation == self.generation
    }

    fn ensure_alive(&self) -> Result<(), BrokerError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(BrokerError::Closed("memory connection lost".to_string()))
        }
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.ensure_alive()?;

        let delay = {
            let mut state = self.broker.lock();
            state.publish_attempts += 1;
            state.publish_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
            self.ensure_alive()?;
        }

        let mut state = self.broker.lock();
        if state.fail_publishes || state.failing_routing_keys.contains(routing_key) {
            return Err(BrokerError::Publish(format!(
                "broker rejected message on {routing_key}"
            )));
        }

        state.published.push(PublishedMessage {
            routing_key: routing_key.to_string(),
            payload: payload.clone(),
        });
        fan_out(&mut state, routing_key, &payload);
        Ok(())
    }

    async fn subscribe(&self, routing_key: &str) -> Result<MessageStream, BrokerError> {
        self.ensure_alive()?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.broker
            .lock()
            .topics
            .entry(routing_key.to_string())
            .or_default()
            .push(tx);

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|payload| (payload, rx))
        })
        .boxed())
    }

    fn status(&self) -> LinkStatus {
        if self.is_alive() {
            LinkStatus::Up
        } else {
            LinkStatus::Lost
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connects_are_counted() {
        let broker = MemoryBroker::new();
        broker.refuse_connects(2);

        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_ok());
        assert_eq!(broker.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let broker = MemoryBroker::new();
        let publisher = broker.connect().await.unwrap();
        let subscriber = broker.connect().await.unwrap();

        let mut stream = subscriber.subscribe("sleep.save").await.unwrap();
        publisher.publish("sleep.save", b"{}".to_vec()).await.unwrap();

        assert_eq!(stream.next().await, Some(b"{}".to_vec()));
        assert_eq!(broker.published_to("sleep.save").len(), 1);
    }

    #[tokio::test]
    async fn test_drop_connections_kills_live_connections() {
        let broker = MemoryBroker::new();
        let connection = broker.connect().await.unwrap();
        assert_eq!(connection.status(), LinkStatus::Up);

        broker.drop_connections();

        assert_eq!(connection.status(), LinkStatus::Lost);
        assert!(connection.publish("a", vec![]).await.is_err());
        assert_eq!(broker.connect().await.unwrap().status(), LinkStatus::Up);
        assert_eq!(broker.generation(), 1);
    }

    #[tokio::test]
    async fn test_failing_routing_key() {
        let broker = MemoryBroker::new();
        broker.fail_routing_key("activities.save");
        let connection = broker.connect().await.unwrap();

        assert!(connection.publish("activities.save", vec![]).await.is_err());
        assert!(connection.publish("sleep.save", vec![]).await.is_ok());
        assert_eq!(broker.publish_attempts(), 2);
        assert_eq!(broker.published().len(), 1);
    }
}
