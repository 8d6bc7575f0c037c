// Copyright (c) 2025 - Cowboy AI, Inc.
//! Counters for handler and replay outcomes
//!
//! Handlers stay stateless: counts live in a shared [`MetricsSink`] passed in
//! at construction, so one handler instance can serve concurrent deliveries.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Counter sink
pub trait MetricsSink: Send + Sync {
    /// Add one to `counter` and return the new total
    fn increment(&self, counter: &str) -> u64;

    /// Current total of `counter`
    fn get(&self, counter: &str) -> u64;
}

/// Process-local counters keyed by name
#[derive(Debug, Default)]
pub struct CounterRegistry {
    counters: Mutex<HashMap<String, u64>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All counters, sorted by name
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot: Vec<_> = counters.iter().map(|(k, v)| (k.clone(), *v)).collect();
        snapshot.sort();
        snapshot
    }
}

impl MetricsSink for CounterRegistry {
    fn increment(&self, counter: &str) -> u64 {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let total = counters.entry(counter.to_string()).or_insert(0);
        *total += 1;
        *total
    }

    fn get(&self, counter: &str) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(counter)
            .copied()
            .unwrap_or(0)
    }
}
