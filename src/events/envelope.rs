// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration event envelope

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::domain_event::{DecodedEvent, DomainEvent, EventName};

/// Envelope fields that payload keys may never overwrite
const RESERVED_KEYS: [&str; 3] = ["event_name", "type", "timestamp"];

/// Measurement family an event belongs to
///
/// The set is open: other producers may tag envelopes with families this
/// service does not know, and those values are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Activity,
    Sleep,
    Environment,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Activity => "activity",
            EventType::Sleep => "sleep",
            EventType::Environment => "environment",
            EventType::Other(value) => value,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EventType::Other(_))
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "activity" => EventType::Activity,
            "sleep" => EventType::Sleep,
            "environment" => EventType::Environment,
            _ => EventType::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

/// Integration event as it travels on the wire
///
/// `payload` holds every non-envelope field of the JSON object, so envelopes
/// produced by other services survive a decode / re-encode unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub event_name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,

    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl IntegrationEvent {
    /// Envelope with no payload
    pub fn new(event_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_name: event_name.into(),
            event_type: None,
            timestamp,
            payload: Map::new(),
        }
    }

    /// Wrap a typed domain event
    ///
    /// # Errors
    ///
    /// Fails only if the payload record cannot be represented as JSON.
    pub fn from_domain(
        event: &DomainEvent,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let name = event.name();
        let mut payload = Map::new();
        payload.insert(name.payload_key().to_string(), event.payload_value()?);

        Ok(Self {
            event_name: name.as_str().to_string(),
            event_type: Some(name.event_type()),
            timestamp,
            payload,
        })
    }

    /// Parse an envelope from a message body
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// JSON form of the envelope
    ///
    /// Total: an envelope without payload yields just the envelope fields, and
    /// payload keys that collide with envelope fields are dropped.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, value) in &self.payload {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                body.insert(key.clone(), value.clone());
            }
        }

        body.insert("event_name".to_string(), Value::String(self.event_name.clone()));
        if let Some(event_type) = &self.event_type {
            body.insert("type".to_string(), Value::String(event_type.as_str().to_string()));
        }
        body.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );

        Value::Object(body)
    }

    /// Message body for the broker
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Deserialize the record stored under `key`
    ///
    /// A missing key reads as an empty object so that validators, not the
    /// decoder, report which fields are absent.
    pub fn payload_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, serde_json::Error> {
        let value = self
            .payload
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(value)
    }

    /// Resolve the envelope into a typed event
    pub fn decode(&self) -> Result<DecodedEvent, serde_json::Error> {
        match EventName::parse(&self.event_name) {
            Some(name) => {
                let payload = self
                    .payload
                    .get(name.payload_key())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                Ok(DecodedEvent::Known(DomainEvent::from_parts(name, payload)?))
            }
            None => Ok(DecodedEvent::Unknown {
                event_name: self.event_name.clone(),
            }),
        }
    }
}
