// Copyright (c) 2025 - Cowboy AI, Inc.

//! Routing keys for measurement events
//!
//! Every integration event travels on a routing key of the form:
//!
//! ```text
//! {resource}.{action}
//! ```
//!
//! e.g. `activities.save`, `sleep.delete`, `environments.save`. The key is
//! used verbatim as the broker subject.
//!
//! # Examples
//!
//! ```rust
//! use activity_tracking_bus::routing::{routing_key, routing_keys, Action, Resource};
//!
//! assert_eq!(routing_key(Resource::Activities, Action::Save), "activities.save");
//! assert_eq!(routing_keys::sleep_save(), "sleep.save");
//! ```

use std::fmt;

/// Measurement resources that publish events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Physical activities
    Activities,
    /// Sleep records
    Sleep,
    /// Environment measurements
    Environments,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Activities => write!(f, "activities"),
            Resource::Sleep => write!(f, "sleep"),
            Resource::Environments => write!(f, "environments"),
        }
    }
}

/// What happened to the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// A record was created
    Save,
    /// A record was changed
    Update,
    /// A record was removed
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Save => write!(f, "save"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Build the routing key for a resource action
pub fn routing_key(resource: Resource, action: Action) -> String {
    format!("{}.{}", resource, action)
}

/// Convenience functions for the routing keys in use
pub mod routing_keys {
    use super::*;

    pub fn activities_save() -> String {
        routing_key(Resource::Activities, Action::Save)
    }

    pub fn activities_update() -> String {
        routing_key(Resource::Activities, Action::Update)
    }

    pub fn activities_delete() -> String {
        routing_key(Resource::Activities, Action::Delete)
    }

    pub fn sleep_save() -> String {
        routing_key(Resource::Sleep, Action::Save)
    }

    pub fn sleep_update() -> String {
        routing_key(Resource::Sleep, Action::Update)
    }

    pub fn sleep_delete() -> String {
        routing_key(Resource::Sleep, Action::Delete)
    }

    pub fn environments_save() -> String {
        routing_key(Resource::Environments, Action::Save)
    }

    pub fn environments_delete() -> String {
        routing_key(Resource::Environments, Action::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_key() {
        assert_eq!(routing_key(Resource::Sleep, Action::Update), "sleep.update");
    }

    #[test]
    fn test_convenience_functions() {
        assert_eq!(routing_keys::activities_save(), "activities.save");
        assert_eq!(routing_keys::activities_delete(), "activities.delete");
        assert_eq!(routing_keys::sleep_save(), "sleep.save");
        assert_eq!(routing_keys::environments_save(), "environments.save");
        assert_eq!(routing_keys::environments_delete(), "environments.delete");
    }

    #[test]
    fn test_display() {
        assert_eq!(Resource::Environments.to_string(), "environments");
        assert_eq!(Action::Delete.to_string(), "delete");
    }
}
