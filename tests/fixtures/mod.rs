// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for activity-tracking-bus
//!
//! Deterministic measurements and envelopes shared by the integration
//! tests. Ids and timestamps are fixed constants so failures reproduce.

#![allow(dead_code)]

use activity_tracking_bus::domain::{
    ActivityLevel, Environment, EnvironmentMeasurement, Location, PhysicalActivity, Sleep,
    SleepPattern, SleepPatternDataSet, SleepType,
};
use activity_tracking_bus::{
    DomainEvent, EventBus, EventHandler, IntegrationEvent, MemoryBroker,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

pub const CHILD_ID: &str = "5a62be07de34500146d9c544";
pub const INSTITUTION_ID: &str = "5a62be07de34500146d9c560";

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// A 30 minute walk that passes creation validation
pub fn activity_fixture() -> PhysicalActivity {
    let start = fixed_timestamp() - Duration::hours(3);
    PhysicalActivity {
        start_time: Some(start),
        end_time: Some(start + Duration::minutes(30)),
        duration: Some(1_800_000),
        child_id: Some(CHILD_ID.to_string()),
        name: Some("walk".to_string()),
        calories: Some(109.0),
        steps: Some(1_407),
        levels: Some(vec![
            ActivityLevel {
                name: "sedentary".to_string(),
                duration: 600_000,
            },
            ActivityLevel {
                name: "lightly".to_string(),
                duration: 1_200_000,
            },
        ]),
        ..Default::default()
    }
}

/// An eight hour classic night that passes creation validation
pub fn sleep_fixture() -> Sleep {
    let start = fixed_timestamp() - Duration::hours(14);
    Sleep {
        start_time: Some(start),
        end_time: Some(start + Duration::hours(8)),
        duration: Some(28_800_000),
        child_id: Some(CHILD_ID.to_string()),
        pattern: Some(SleepPattern {
            data_set: vec![SleepPatternDataSet {
                start_time: start,
                name: "asleep".to_string(),
                duration: 28_800_000,
            }],
        }),
        sleep_type: Some(SleepType::Classic),
        ..Default::default()
    }
}

/// A classroom temperature reading that passes creation validation
pub fn environment_fixture() -> Environment {
    Environment {
        institution_id: Some(INSTITUTION_ID.to_string()),
        location: Some(Location {
            local: Some("indoor".to_string()),
            room: Some("room 01".to_string()),
            ..Default::default()
        }),
        measurements: Some(vec![EnvironmentMeasurement {
            measurement_type: "temperature".to_string(),
            value: 23.5,
            unit: "°C".to_string(),
        }]),
        climatized: Some(true),
        timestamp: Some(fixed_timestamp()),
        ..Default::default()
    }
}

/// Wrap a domain event in an envelope stamped with the fixed timestamp
pub fn envelope(event: DomainEvent) -> IntegrationEvent {
    IntegrationEvent::from_domain(&event, fixed_timestamp()).expect("Fixture must serialize")
}

/// Event bus whose both sides connect to `broker`
pub fn memory_bus(broker: &MemoryBroker) -> Arc<EventBus> {
    Arc::new(EventBus::new(
        Arc::new(broker.clone()),
        Arc::new(broker.clone()),
    ))
}

/// Handler that remembers every delivered event
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<IntegrationEvent>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<IntegrationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: IntegrationEvent) {
        self.events.lock().unwrap().push(event);
    }
}
