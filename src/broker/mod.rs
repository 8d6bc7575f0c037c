// Copyright (c) 2025 - Cowboy AI, Inc.
//! Message broker seam
//!
//! The event bus never talks to a broker client directly. It asks a
//! [`BrokerConnector`] for a [`BrokerConnection`] and publishes / subscribes
//! through it, which keeps the connection managers independent of the wire.
//!
//! # Implementations
//!
//! - [`nats`] - production broker on NATS core subjects
//! - [`memory`] - in-process broker with fault injection, used by tests
//!
//! Routing keys are used as broker subjects verbatim (`activities.save`,
//! `sleep.save`, `environments.save`, ...).

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod nats;

pub use memory::{MemoryBroker, PublishedMessage};
pub use nats::{NatsConfig, NatsConnector};

/// Raw message bodies delivered for one routing key
pub type MessageStream = BoxStream<'static, Vec<u8>>;

/// Errors raised at the broker seam
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Opening a connection failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connection was closed or lost
    #[error("connection closed: {0}")]
    Closed(String),

    /// Publish was not acknowledged
    #[error("publish failed: {0}")]
    Publish(String),

    /// Subscription was rejected
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

/// Health of a broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Connected and usable
    Up,
    /// Down, but the client library is reconnecting on its own
    Recovering,
    /// Down for good; a new connection must be opened
    Lost,
}

/// A single live broker connection
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Publish a message body and wait for the broker to acknowledge it
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Open a stream of message bodies arriving on `routing_key`
    async fn subscribe(&self, routing_key: &str) -> Result<MessageStream, BrokerError>;

    /// Current health of the underlying link
    ///
    /// Must stop reporting [`LinkStatus::Up`] as soon as the broker drops the
    /// connection.
    fn status(&self) -> LinkStatus;

    /// Close the connection; idempotent
    async fn close(&self);
}

/// Factory for broker connections, invoked once per connection attempt
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a new connection
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, BrokerError>;

    /// Human readable target, used in log lines
    fn target(&self) -> String;
}
