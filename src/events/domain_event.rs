// Copyright (c) 2025 - Cowboy AI, Inc.
//! Known event kinds

use serde_json::Value;
use std::fmt;

use super::envelope::EventType;
use crate::domain::{Environment, PhysicalActivity, Record, Sleep};

/// Closed set of event names this service understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    PhysicalActivitySave,
    PhysicalActivityUpdate,
    PhysicalActivityDelete,
    SleepSave,
    SleepUpdate,
    SleepDelete,
    EnvironmentSave,
    EnvironmentDelete,
}

impl EventName {
    /// Every known name
    pub const ALL: [EventName; 8] = [
        EventName::PhysicalActivitySave,
        EventName::PhysicalActivityUpdate,
        EventName::PhysicalActivityDelete,
        EventName::SleepSave,
        EventName::SleepUpdate,
        EventName::SleepDelete,
        EventName::EnvironmentSave,
        EventName::EnvironmentDelete,
    ];

    /// Name as it appears in `event_name`
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::PhysicalActivitySave => "PhysicalActivitySaveEvent",
            EventName::PhysicalActivityUpdate => "PhysicalActivityUpdateEvent",
            EventName::PhysicalActivityDelete => "PhysicalActivityDeleteEvent",
            EventName::SleepSave => "SleepSaveEvent",
            EventName::SleepUpdate => "SleepUpdateEvent",
            EventName::SleepDelete => "SleepDeleteEvent",
            EventName::EnvironmentSave => "EnvironmentSaveEvent",
            EventName::EnvironmentDelete => "EnvironmentDeleteEvent",
        }
    }

    /// Match a wire name against the known set
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.as_str() == name)
    }

    pub fn event_type(&self) -> EventType {
        match self {
            EventName::PhysicalActivitySave
            | EventName::PhysicalActivityUpdate
            | EventName::PhysicalActivityDelete => EventType::Activity,
            EventName::SleepSave | EventName::SleepUpdate | EventName::SleepDelete => {
                EventType::Sleep
            }
            EventName::EnvironmentSave | EventName::EnvironmentDelete => EventType::Environment,
        }
    }

    /// Envelope key holding the payload record
    pub fn payload_key(&self) -> &'static str {
        match self {
            EventName::PhysicalActivitySave
            | EventName::PhysicalActivityUpdate
            | EventName::PhysicalActivityDelete => PhysicalActivity::PAYLOAD_KEY,
            EventName::SleepSave | EventName::SleepUpdate | EventName::SleepDelete => {
                Sleep::PAYLOAD_KEY
            }
            EventName::EnvironmentSave | EventName::EnvironmentDelete => Environment::PAYLOAD_KEY,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed integration event
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    PhysicalActivitySave(PhysicalActivity),
    PhysicalActivityUpdate(PhysicalActivity),
    PhysicalActivityDelete(PhysicalActivity),
    SleepSave(Sleep),
    SleepUpdate(Sleep),
    SleepDelete(Sleep),
    EnvironmentSave(Environment),
    EnvironmentDelete(Environment),
}

impl DomainEvent {
    pub fn name(&self) -> EventName {
        match self {
            DomainEvent::PhysicalActivitySave(_) => EventName::PhysicalActivitySave,
            DomainEvent::PhysicalActivityUpdate(_) => EventName::PhysicalActivityUpdate,
            DomainEvent::PhysicalActivityDelete(_) => EventName::PhysicalActivityDelete,
            DomainEvent::SleepSave(_) => EventName::SleepSave,
            DomainEvent::SleepUpdate(_) => EventName::SleepUpdate,
            DomainEvent::SleepDelete(_) => EventName::SleepDelete,
            DomainEvent::EnvironmentSave(_) => EventName::EnvironmentSave,
            DomainEvent::EnvironmentDelete(_) => EventName::EnvironmentDelete,
        }
    }

    /// Payload record as JSON
    pub fn payload_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            DomainEvent::PhysicalActivitySave(activity)
            | DomainEvent::PhysicalActivityUpdate(activity)
            | DomainEvent::PhysicalActivityDelete(activity) => serde_json::to_value(activity),
            DomainEvent::SleepSave(sleep)
            | DomainEvent::SleepUpdate(sleep)
            | DomainEvent::SleepDelete(sleep) => serde_json::to_value(sleep),
            DomainEvent::EnvironmentSave(environment)
            | DomainEvent::EnvironmentDelete(environment) => serde_json::to_value(environment),
        }
    }

    /// Rebuild a typed event from its name and payload JSON
    pub fn from_parts(name: EventName, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            EventName::PhysicalActivitySave => {
                DomainEvent::PhysicalActivitySave(serde_json::from_value(payload)?)
            }
            EventName::PhysicalActivityUpdate => {
                DomainEvent::PhysicalActivityUpdate(serde_json::from_value(payload)?)
            }
            EventName::PhysicalActivityDelete => {
                DomainEvent::PhysicalActivityDelete(serde_json::from_value(payload)?)
            }
            EventName::SleepSave => DomainEvent::SleepSave(serde_json::from_value(payload)?),
            EventName::SleepUpdate => DomainEvent::SleepUpdate(serde_json::from_value(payload)?),
            EventName::SleepDelete => DomainEvent::SleepDelete(serde_json::from_value(payload)?),
            EventName::EnvironmentSave => {
                DomainEvent::EnvironmentSave(serde_json::from_value(payload)?)
            }
            EventName::EnvironmentDelete => {
                DomainEvent::EnvironmentDelete(serde_json::from_value(payload)?)
            }
        })
    }
}

/// Result of resolving an envelope's `event_name`
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    Known(DomainEvent),
    Unknown { event_name: String },
}
