// Copyright (c) 2025 - Cowboy AI, Inc.
//! Sleep record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NaturalKey, Record};

/// How the sleep pattern was staged by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepType {
    /// asleep / restless / awake
    #[default]
    Classic,
    /// deep / light / rem / wake
    Stages,
}

impl SleepType {
    /// Data-set names valid for this staging
    pub fn stage_names(&self) -> &'static [&'static str] {
        match self {
            SleepType::Classic => &["asleep", "restless", "awake"],
            SleepType::Stages => &["deep", "light", "rem", "wake"],
        }
    }
}

/// One stage interval inside a sleep pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepPatternDataSet {
    pub start_time: DateTime<Utc>,
    pub name: String,
    /// Milliseconds
    pub duration: i64,
}

/// Stage breakdown of a sleep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepPattern {
    #[serde(default)]
    pub data_set: Vec<SleepPatternDataSet>,
}

/// A sleep record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sleep {
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
    pub pattern: Option<SleepPattern>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub sleep_type: Option<SleepType>,
}

impl Record for Sleep {
    const PAYLOAD_KEY: &'static str = "sleep";
    const KIND: &'static str = "sleep";

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
