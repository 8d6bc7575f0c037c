// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event bus tests aligned with user stories

mod fixtures;

use activity_tracking_bus::routing::routing_keys;
use activity_tracking_bus::{
    BusError, ConnectionManager, ConnectionRole, ConnectionState, DomainEvent, EventName,
    MemoryBroker, RetryPolicy,
};
use fixtures::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// User Story: Fail fast while the broker is away
///
/// As a service writing measurements
/// I want publishing to fail immediately while disconnected
/// So that I can park the event in the outbox instead of waiting
///
/// Acceptance Criteria:
/// - Publishing without a publish connection fails with `NotConnected`
/// - Nothing reaches the broker
#[tokio::test]
async fn test_publish_while_disconnected_is_rejected() {
    // Given a bus whose publish side never connected
    let broker = MemoryBroker::new();
    let bus = memory_bus(&broker);

    // When an event is published
    let result = bus
        .publish(
            &envelope(DomainEvent::SleepSave(sleep_fixture())),
            &routing_keys::sleep_save(),
        )
        .await;

    // Then it is rejected as not connected and never sent
    assert!(matches!(
        result,
        Err(BusError::NotConnected {
            role: ConnectionRole::Publish
        })
    ));
    assert_eq!(broker.publish_attempts(), 0);
    assert!(broker.published().is_empty());
}

/// User Story: Publish and consume across services
///
/// As a downstream service
/// I want every published measurement event delivered to my handler
/// So that I can keep my own copy up to date
#[tokio::test]
async fn test_published_event_reaches_subscriber() {
    // Given a connected bus with a handler on sleep.save
    let broker = MemoryBroker::new();
    let bus = memory_bus(&broker);
    assert_ok!(bus.connect_publisher(1, RetryPolicy::default()).await);
    assert_ok!(bus.connect_subscriber(1, RetryPolicy::default()).await);
    let handler = Arc::new(RecordingHandler::default());
    assert_ok!(
        bus.subscribe(EventName::SleepSave, handler.clone(), &routing_keys::sleep_save())
            .await
    );

    // When a sleep event is published
    let event = envelope(DomainEvent::SleepSave(sleep_fixture()));
    assert!(assert_ok!(bus.publish(&event, &routing_keys::sleep_save()).await));
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Then the handler receives the same envelope
    assert_eq!(handler.events(), vec![event.clone()]);
    assert_eq!(broker.published()[0].json(), event.to_json());
}

/// User Story: Accept envelopes from newer producers
///
/// As a downstream service
/// I want events tagged with a measurement family I do not know delivered
/// So that a producer adding new families never silences my consumers
#[tokio::test]
async fn test_foreign_event_type_is_delivered_unchanged() {
    // Given a connected bus with a handler on sleep.save
    let broker = MemoryBroker::new();
    let bus = memory_bus(&broker);
    assert_ok!(bus.connect_subscriber(1, RetryPolicy::default()).await);
    let handler = Arc::new(RecordingHandler::default());
    assert_ok!(
        bus.subscribe(EventName::SleepSave, handler.clone(), &routing_keys::sleep_save())
            .await
    );

    // When a sleep event arrives with a type this service does not know
    let body = serde_json::json!({
        "event_name": "SleepSaveEvent",
        "type": "weight",
        "timestamp": FIXED_TIMESTAMP,
        "sleep": { "child_id": CHILD_ID }
    });
    broker.inject(&routing_keys::sleep_save(), body.to_string().into_bytes());
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Then the handler receives it with the type intact
    assert_eq!(handler.count(), 1);
    assert_eq!(handler.events()[0].to_json(), body);
}

/// User Story: Idempotent registration
///
/// As a service restarting its consumers
/// I want subscribing twice to the same event and key to be harmless
/// So that each message is handled once
#[tokio::test]
async fn test_double_subscribe_is_idempotent() {
    // Given a connected subscriber side
    let broker = MemoryBroker::new();
    let bus = memory_bus(&broker);
    assert_ok!(bus.connect_subscriber(1, RetryPolicy::default()).await);
    let handler = Arc::new(RecordingHandler::default());
    let key = routing_keys::activities_save();

    // When the same binding is subscribed twice
    let first = bus
        .subscribe(EventName::PhysicalActivitySave, handler.clone(), &key)
        .await;
    let second = bus
        .subscribe(EventName::PhysicalActivitySave, handler.clone(), &key)
        .await;

    // Then both succeed but only one broker subscription exists
    assert!(assert_ok!(first));
    assert!(assert_ok!(second));
    assert_eq!(broker.subscriber_count(&key), 1);
    assert_eq!(bus.subscription_count(), 1);

    // And a message is delivered once
    broker.inject(
        &key,
        envelope(DomainEvent::PhysicalActivitySave(activity_fixture())).to_bytes(),
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handler.count(), 1);
}

/// User Story: Survive a broker restart
///
/// As a consumer
/// I want my subscriptions restored after the broker drops the connection
/// So that I keep receiving events without a service restart
#[tokio::test(start_paused = true)]
async fn test_subscription_restored_after_broker_drop() {
    // Given a subscribed handler
    let broker = MemoryBroker::new();
    let bus = memory_bus(&broker);
    assert_ok!(
        bus.connect_subscriber(0, RetryPolicy::Fixed(Duration::from_millis(50)))
            .await
    );
    let handler = Arc::new(RecordingHandler::default());
    let key = routing_keys::environments_save();
    assert_ok!(
        bus.subscribe(EventName::EnvironmentSave, handler.clone(), &key)
            .await
    );

    // When the broker drops every connection
    broker.drop_connections();
    assert!(!bus.is_subscriber_connected());
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Then the bus reconnects and re-binds the subscription
    assert!(bus.is_subscriber_connected());
    assert_eq!(broker.subscriber_count(&key), 1);

    broker.inject(
        &key,
        envelope(DomainEvent::EnvironmentSave(environment_fixture())).to_bytes(),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handler.count(), 1);
}

/// User Story: Clean shutdown
///
/// As an operator stopping the service
/// I want the bus to close both connections
/// So that nothing is published after shutdown
#[tokio::test]
async fn test_disposed_bus_rejects_everything() {
    // Given a fully connected bus
    let broker = MemoryBroker::new();
    let bus = memory_bus(&broker);
    assert_ok!(bus.connect_publisher(1, RetryPolicy::default()).await);
    assert_ok!(bus.connect_subscriber(1, RetryPolicy::default()).await);

    // When it is disposed (twice)
    bus.dispose().await;
    bus.dispose().await;

    // Then publish, subscribe and connect all fail with a connection error
    let event = envelope(DomainEvent::SleepSave(sleep_fixture()));
    let publish = bus.publish(&event, &routing_keys::sleep_save()).await;
    assert!(matches!(publish, Err(BusError::Connection(_))));

    let handler = Arc::new(RecordingHandler::default());
    let subscribe = bus
        .subscribe(EventName::SleepSave, handler, &routing_keys::sleep_save())
        .await;
    assert!(matches!(subscribe, Err(BusError::Connection(_))));

    assert_err!(bus.connect_publisher(1, RetryPolicy::default()).await);
    assert_eq!(bus.publisher_state(), ConnectionState::Disconnected);
    assert_eq!(broker.publish_attempts(), 0);
}

/// User Story: Keep trying until the broker is up
///
/// As a service starting before its broker
/// I want connection attempts to continue at a fixed interval
/// So that the bus comes up as soon as the broker does
///
/// Acceptance Criteria:
/// - `try_connect(0, 1500ms)` with two refused attempts connects on the third
/// - at least 2 × 1500 ms elapse before it resolves
#[tokio::test(start_paused = true)]
async fn test_try_connect_retries_until_broker_is_reachable() {
    // Given a broker that refuses the first two connections
    let broker = MemoryBroker::new();
    broker.refuse_connects(2);
    let manager = ConnectionManager::new(ConnectionRole::Publish, Arc::new(broker.clone()));
    let started = tokio::time::Instant::now();

    // When connecting with unlimited retries
    assert_ok!(manager.try_connect(0, Duration::from_millis(1500)).await);

    // Then the third attempt succeeds after two full intervals
    assert_eq!(broker.connect_attempts(), 3);
    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_policy_spaces_attempts() {
    // Given a broker that refuses three connections
    let broker = MemoryBroker::new();
    broker.refuse_connects(3);
    let manager = ConnectionManager::new(ConnectionRole::Subscribe, Arc::new(broker.clone()));
    let policy = RetryPolicy::Exponential {
        initial: Duration::from_millis(100),
        max: Duration::from_millis(250),
        multiplier: 2,
    };
    let started = tokio::time::Instant::now();

    // When connecting with the exponential policy
    assert_ok!(manager.try_connect_with(0, policy).await);

    // Then waits were 100 + 200 + 250 (capped)
    assert_eq!(broker.connect_attempts(), 4);
    assert!(started.elapsed() >= Duration::from_millis(550));
}
