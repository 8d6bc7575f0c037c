// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration Events
//!
//! Wire envelope exchanged with other services, and the closed set of event
//! kinds this service knows how to produce and consume.
//!
//! # Wire Format
//!
//! One JSON object per message. Envelope fields sit next to a single payload
//! field whose key depends on the measurement:
//!
//! ```text
//! {
//!   "event_name": "PhysicalActivitySaveEvent",
//!   "type": "activity",
//!   "timestamp": "2026-01-19T12:00:00Z",
//!   "physicalactivity": { ... }
//! }
//! ```
//!
//! # Decoding
//!
//! [`IntegrationEvent::decode`] turns an envelope into
//! [`DecodedEvent::Known`] with a typed [`DomainEvent`], or
//! [`DecodedEvent::Unknown`] when `event_name` is outside the known set.
//! Name matching happens once, at the JSON boundary.
//!
//! # Module Organization
//!
//! - [`envelope`] - [`IntegrationEvent`] and its serialization
//! - [`domain_event`] - [`EventName`], [`DomainEvent`], [`DecodedEvent`]

pub mod domain_event;
pub mod envelope;

pub use domain_event::{DecodedEvent, DomainEvent, EventName};
pub use envelope::{EventType, IntegrationEvent};
