//! Integration event bus for child activity tracking
//!
//! Publishes physical-activity, sleep and environment events to other
//! services and consumes theirs, with at-least-once delivery:
//!
//! - [`event_bus`] - publish/subscribe over independent publish and
//!   subscribe connections, each supervised by a [`connection`] manager
//! - [`outbox`] - durable store for events that could not be published,
//!   plus the [`OutboxPublisher`] local write paths go through
//! - [`replay`] - periodic task that republishes the outbox
//! - [`handlers`] - idempotent consumers that validate and store inbound
//!   measurements

pub mod broker;
pub mod config;
pub mod connection;
pub mod domain;
pub mod errors;
pub mod event_bus;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod outbox;
pub mod replay;
pub mod repository;
pub mod routing;

// Re-export commonly used types
pub use broker::{MemoryBroker, NatsConfig, NatsConnector};
pub use config::BusConfig;
pub use connection::{ConnectionManager, ConnectionState, RetryPolicy};
pub use errors::{BusError, BusResult, ConnectionRole};
pub use event_bus::{EventBus, EventHandler};
pub use events::{DecodedEvent, DomainEvent, EventName, EventType, IntegrationEvent};
pub use handlers::{ConsumerRegistry, HandlerError, Repositories};
pub use metrics::{CounterRegistry, MetricsSink};
pub use outbox::{
    FileOutboxStore, InMemoryOutboxStore, OutboxError, OutboxId, OutboxPublisher, OutboxRecord,
    OutboxStore, PublishOutcome,
};
pub use replay::{DrainReport, ReplayConfig, ReplayState, ReplayTask};
