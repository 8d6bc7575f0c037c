// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for event bus operations

use thiserror::Error;

/// Which side of the bus an operation needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Outbound connection used by `publish`
    Publish,
    /// Inbound connection used by `subscribe`
    Subscribe,
}

impl std::fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionRole::Publish => write!(f, "publish"),
            ConnectionRole::Subscribe => write!(f, "subscribe"),
        }
    }
}

/// Errors that can occur in event bus operations
#[derive(Debug, Error)]
pub enum BusError {
    /// Broker unreachable, retry budget exhausted, or bus disposed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation attempted while the required connection is down
    #[error("Event bus {role} connection is not established")]
    NotConnected {
        /// Connection the operation needed
        role: ConnectionRole,
    },

    /// Broker rejected or failed to acknowledge a publish
    #[error("Publish error: {0}")]
    Publish(String),

    /// Broker rejected a subscription
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BusError {
    /// True for the fail-fast error returned while disconnected
    pub fn is_not_connected(&self) -> bool {
        matches!(self, BusError::NotConnected { .. })
    }
}

/// Result type for event bus operations
pub type BusResult<T> = Result<T, BusError>;

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Serialization(err.to_string())
    }
}

impl From<crate::broker::BrokerError> for BusError {
    fn from(err: crate::broker::BrokerError) -> Self {
        use crate::broker::BrokerError;

        match err {
            BrokerError::Connect(msg) | BrokerError::Closed(msg) => BusError::Connection(msg),
            BrokerError::Publish(msg) => BusError::Publish(msg),
            BrokerError::Subscribe(msg) => BusError::Subscribe(msg),
        }
    }
}
