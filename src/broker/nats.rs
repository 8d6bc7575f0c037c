// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS broker connection

use async_nats::connection::State;
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::{BrokerConnection, BrokerConnector, BrokerError, LinkStatus, MessageStream};

/// Configuration for a NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name reported to the server
    pub name: String,
    /// Timeout for a single connection attempt
    pub connect_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "activity-tracking-bus".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens NATS connections for a connection manager
#[derive(Debug, Clone)]
pub struct NatsConnector {
    config: NatsConfig,
}

impl NatsConnector {
    /// Create a connector for the given configuration
    pub fn new(config: NatsConfig) -> Self {
        Self { config }
    }

    /// Connector with a role suffix appended to the client name
    ///
    /// Publish and subscribe sides use separate connections; distinct names
    /// make them tell apart in the server's connection list.
    pub fn with_role(mut config: NatsConfig, role: &str) -> Self {
        config.name = format!("{}-{}", config.name, role);
        Self { config }
    }
}

#[async_trait]
impl BrokerConnector for NatsConnector {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
        let options = ConnectOptions::new()
            .name(&self.config.name)
            .connection_timeout(self.config.connect_timeout);

        let client = async_nats::connect_with_options(self.config.servers.join(","), options)
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        info!(servers = ?self.config.servers, name = %self.config.name, "Connected to NATS");

        Ok(Arc::new(NatsConnection {
            client: Mutex::new(Some(client)),
        }))
    }

    fn target(&self) -> String {
        self.config.servers.join(",")
    }
}

/// A live NATS client
pub struct NatsConnection {
    client: Mutex<Option<Client>>,
}

impl NatsConnection {
    fn client(&self) -> Result<Client, BrokerError> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| BrokerError::Closed("NATS client closed".to_string()))
    }
}

#[async_trait]
impl BrokerConnection for NatsConnection {
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let client = self.client()?;

        client
            .publish(routing_key.to_string(), payload.into())
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        // Core NATS has no per-message ack; a completed flush means the server has it.
        client
            .flush()
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        debug!(subject = %routing_key, "Published message");
        Ok(())
    }

    async fn subscribe(&self, routing_key: &str) -> Result<MessageStream, BrokerError> {
        let client = self.client()?;

        let subscriber = client
            .subscribe(routing_key.to_string())
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

        info!(subject = %routing_key, "Subscribed to subject");
        Ok(subscriber.map(|message| message.payload.to_vec()).boxed())
    }

    fn status(&self) -> LinkStatus {
        let guard = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref().map(Client::connection_state) {
            Some(State::Connected) => LinkStatus::Up,
            // async-nats keeps reconnecting in the background
            Some(_) => LinkStatus::Recovering,
            None => LinkStatus::Lost,
        }
    }

    async fn close(&self) {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(client) = client {
            // Dropping the last handle shuts the connection down.
            let _ = client.flush().await;
            drop(client);
            debug!("NATS connection closed");
        }
    }
}
