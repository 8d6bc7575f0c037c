// Copyright (c) 2025 - Cowboy AI, Inc.
//! Consumer registration table, built once at startup

use std::sync::Arc;
use tracing::{info, warn};

use super::{DeleteHandler, SaveHandler, UpdateHandler};
use crate::domain::validation::{CreateValidator, RemoveValidator, UpdateValidator};
use crate::domain::{Environment, PhysicalActivity, Sleep};
use crate::errors::BusResult;
use crate::event_bus::{EventBus, EventHandler};
use crate::events::EventName;
use crate::metrics::MetricsSink;
use crate::repository::MeasurementRepository;
use crate::routing::routing_keys;

/// One `(event, routing key) → handler` row
#[derive(Clone)]
pub struct ConsumerBinding {
    pub event_name: EventName,
    pub routing_key: String,
    pub handler: Arc<dyn EventHandler>,
}

/// Repositories the standard consumers write to
#[derive(Clone)]
pub struct Repositories {
    pub activities: Arc<dyn MeasurementRepository<PhysicalActivity>>,
    pub sleep: Arc<dyn MeasurementRepository<Sleep>>,
    pub environments: Arc<dyn MeasurementRepository<Environment>>,
}

/// Every consumer the service runs
#[derive(Clone, Default)]
pub struct ConsumerRegistry {
    bindings: Vec<ConsumerBinding>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding
    pub fn register(
        mut self,
        event_name: EventName,
        routing_key: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.bindings.push(ConsumerBinding {
            event_name,
            routing_key: routing_key.into(),
            handler,
        });
        self
    }

    /// The full set of measurement consumers
    pub fn standard(repositories: &Repositories, metrics: Arc<dyn MetricsSink>) -> Self {
        let create = Arc::new(CreateValidator);
        let update = Arc::new(UpdateValidator);
        let remove = Arc::new(RemoveValidator);

        Self::new()
            .register(
                EventName::PhysicalActivitySave,
                routing_keys::activities_save(),
                Arc::new(SaveHandler::new(
                    repositories.activities.clone(),
                    create.clone(),
                    metrics.clone(),
                )),
            )
            .register(
                EventName::PhysicalActivityUpdate,
                routing_keys::activities_update(),
                Arc::new(UpdateHandler::new(
                    repositories.activities.clone(),
                    update.clone(),
                    metrics.clone(),
                )),
            )
            .register(
                EventName::PhysicalActivityDelete,
                routing_keys::activities_delete(),
                Arc::new(DeleteHandler::new(
                    repositories.activities.clone(),
                    remove.clone(),
                    metrics.clone(),
                )),
            )
            .register(
                EventName::SleepSave,
                routing_keys::sleep_save(),
                Arc::new(SaveHandler::new(
                    repositories.sleep.clone(),
                    create.clone(),
                    metrics.clone(),
                )),
            )
            .register(
                EventName::SleepUpdate,
                routing_keys::sleep_update(),
                Arc::new(UpdateHandler::new(
                    repositories.sleep.clone(),
                    update,
                    metrics.clone(),
                )),
            )
            .register(
                EventName::SleepDelete,
                routing_keys::sleep_delete(),
                Arc::new(DeleteHandler::new(
                    repositories.sleep.clone(),
                    remove.clone(),
                    metrics.clone(),
                )),
            )
            .register(
                EventName::EnvironmentSave,
                routing_keys::environments_save(),
                Arc::new(SaveHandler::new(
                    repositories.environments.clone(),
                    create,
                    metrics.clone(),
                )),
            )
            .register(
                EventName::EnvironmentDelete,
                routing_keys::environments_delete(),
                Arc::new(DeleteHandler::new(
                    repositories.environments.clone(),
                    remove,
                    metrics,
                )),
            )
    }

    pub fn bindings(&self) -> &[ConsumerBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Subscribe every binding on `bus`
    ///
    /// Attempts all bindings even if some fail; returns how many are bound.
    ///
    /// # Errors
    ///
    /// The first subscribe failure, after every binding has been tried.
    pub async fn subscribe_all(&self, bus: &EventBus) -> BusResult<usize> {
        let mut bound = 0;
        let mut first_error = None;

        for binding in &self.bindings {
            match bus
                .subscribe(binding.event_name, binding.handler.clone(), &binding.routing_key)
                .await
            {
                Ok(_) => bound += 1,
                Err(error) => {
                    warn!(
                        routing_key = %binding.routing_key,
                        event_name = %binding.event_name,
                        error = %error,
                        "Consumer subscription failed"
                    );
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                info!(consumers = bound, "Consumers subscribed");
                Ok(bound)
            }
        }
    }
}
