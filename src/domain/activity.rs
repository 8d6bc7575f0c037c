// Copyright (c) 2025 - Cowboy AI, Inc.
//! Physical activity record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NaturalKey, Record};

/// Intensity level names accepted in [`ActivityLevel::name`]
pub const LEVEL_NAMES: [&str; 4] = ["sedentary", "lightly", "fairly", "very"];

/// Time spent at one intensity level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLevel {
    pub name: String,
    /// Milliseconds
    pub duration: i64,
}

/// A physical activity session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalActivity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<ActivityLevel>>,
    /// Heart rate zones, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<serde_json::Value>,
}

impl Record for PhysicalActivity {
    const PAYLOAD_KEY: &'static str = "physicalactivity";
    const KIND: &'static str = "physical activity";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn owner_id(&self) -> Option<&str> {
        self.child_id.as_deref()
    }

    fn natural_key(&self) -> Option<NaturalKey> {
        Some(NaturalKey::ChildInterval {
            start_time: self.start_time?,
            child_id: self.child_id.clone()?,
        })
    }
}
