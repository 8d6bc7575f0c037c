// Copyright (c) 2025 - Cowboy AI, Inc.
//! Environment reading

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NaturalKey, Record};

/// Where a reading was taken
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
}

/// A single sensor value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// temperature, humidity, pm2.5, ...
    #[serde(rename = "type")]
    pub measurement_type: String,
    pub value: f64,
    pub unit: String,
}

/// Indoor climate reading for an institution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Vec<Measurement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub climatized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Record for Environment {
    const PAYLOAD_KEY: &'static str = "environment";
    const KIND: &'static str = "environment";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn owner_id(&self) -> Option<&str> {
        self.institution_id.as_deref()
    }

    fn natural_key(&self) -> Option<NaturalKey> {
        let location = self.location.as_ref()?;
        Some(NaturalKey::PlaceReading {
            timestamp: self.timestamp?,
            institution_id: self.institution_id.clone()?,
            local: location.local.clone()?,
            room: location.room.clone()?,
        })
    }
}
