// Copyright (c) 2025 - Cowboy AI, Inc.
//! Publish-or-store front door for local write paths

use std::sync::Arc;
use tracing::{info, warn};

use super::{OutboxEntry, OutboxError, OutboxId, OutboxStore};
use crate::event_bus::EventBus;
use crate::events::IntegrationEvent;

/// Result of handing an event to the [`OutboxPublisher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The broker acknowledged the event
    Published,
    /// The publish failed; the event waits in the outbox under this id
    Stored(OutboxId),
}

/// Publishes through the event bus and falls back to the outbox
///
/// Every failed publish, whatever the cause, becomes an outbox record that
/// the replay task will retry.
pub struct OutboxPublisher {
    bus: Arc<EventBus>,
    store: Arc<dyn OutboxStore>,
}

impl OutboxPublisher {
    pub fn new(bus: Arc<EventBus>, store: Arc<dyn OutboxStore>) -> Self {
        Self { bus, store }
    }

    /// Publish `event`, or persist it for replay if that fails
    ///
    /// # Errors
    ///
    /// Only when the publish failed *and* the outbox append failed too; the
    /// event is then lost to this process and the caller must decide.
    pub async fn publish(
        &self,
        event: IntegrationEvent,
        routing_key: &str,
    ) -> Result<PublishOutcome, OutboxError> {
        let error = match self.bus.publish(&event, routing_key).await {
            Ok(_) => return Ok(PublishOutcome::Published),
            Err(error) => error,
        };

        let event_name = event.event_name.clone();
        let record = self
            .store
            .append(OutboxEntry::publish(event, routing_key))
            .await
            .inspect_err(|store_error| {
                warn!(
                    routing_key = %routing_key,
                    event_name = %event_name,
                    publish_error = %error,
                    error = %store_error,
                    "Event could neither be published nor stored"
                );
            })?;

        info!(
            routing_key = %routing_key,
            event_name = %event_name,
            record_id = %record.id,
            reason = %error,
            "Event stored in outbox for later delivery"
        );
        Ok(PublishOutcome::Stored(record.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::connection::RetryPolicy;
    use crate::outbox::InMemoryOutboxStore;
    use chrono::Utc;

    fn setup(broker: &MemoryBroker) -> (Arc<EventBus>, Arc<InMemoryOutboxStore>, OutboxPublisher) {
        let bus = Arc::new(EventBus::new(
            Arc::new(broker.clone()),
            Arc::new(broker.clone()),
        ));
        let store = Arc::new(InMemoryOutboxStore::new());
        let publisher = OutboxPublisher::new(Arc::clone(&bus), store.clone());
        (bus, store, publisher)
    }

    #[tokio::test]
    async fn test_stores_when_bus_is_down() {
        let broker = MemoryBroker::new();
        let (_bus, store, publisher) = setup(&broker);

        let outcome = publisher
            .publish(IntegrationEvent::new("SleepSaveEvent", Utc::now()), "sleep.save")
            .await
            .unwrap();

        let PublishOutcome::Stored(id) = outcome else {
            panic!("expected the event to be stored");
        };
        assert_eq!(store.ids(), vec![id]);
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_publishes_directly_when_bus_is_up() {
        let broker = MemoryBroker::new();
        let (bus, store, publisher) = setup(&broker);
        bus.connect_publisher(1, RetryPolicy::default()).await.unwrap();

        let outcome = publisher
            .publish(IntegrationEvent::new("SleepSaveEvent", Utc::now()), "sleep.save")
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Published);
        assert!(store.is_empty());
        assert_eq!(broker.published_to("sleep.save").len(), 1);
    }

    #[tokio::test]
    async fn test_stores_when_broker_rejects() {
        let broker = MemoryBroker::new();
        broker.set_fail_publishes(true);
        let (bus, store, publisher) = setup(&broker);
        bus.connect_publisher(1, RetryPolicy::default()).await.unwrap();

        let outcome = publisher
            .publish(IntegrationEvent::new("SleepSaveEvent", Utc::now()), "sleep.save")
            .await
            .unwrap();

        assert!(matches!(outcome, PublishOutcome::Stored(_)));
        assert_eq!(store.len(), 1);
    }
}
