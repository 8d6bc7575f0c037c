// Copyright (c) 2025 - Cowboy AI, Inc.
//! Delete handler: remove a record by owner and id if present

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{counter_name, HandlerError};
use crate::domain::{Record, ValidationError, Validator};
use crate::event_bus::EventHandler;
use crate::events::IntegrationEvent;
use crate::metrics::MetricsSink;
use crate::repository::MeasurementRepository;

/// Removes the record addressed by a `*DeleteEvent`
pub struct DeleteHandler<R: Record> {
    repository: Arc<dyn MeasurementRepository<R>>,
    validator: Arc<dyn Validator<R>>,
    metrics: Arc<dyn MetricsSink>,
}

impl<R: Record> DeleteHandler<R> {
    pub fn new(
        repository: Arc<dyn MeasurementRepository<R>>,
        validator: Arc<dyn Validator<R>>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            repository,
            validator,
            metrics,
        }
    }

    /// Whether a stored record was removed
    pub async fn process(&self, event: &IntegrationEvent) -> Result<bool, HandlerError> {
        let record: R = event.payload_as(R::PAYLOAD_KEY)?;
        self.validator.validate(&record)?;

        let (Some(owner_id), Some(id)) = (record.owner_id(), record.id()) else {
            return Err(ValidationError::MissingFields(vec!["id", "owner_id"]).into());
        };
        Ok(self.repository.remove(owner_id, id).await?)
    }
}

#[async_trait]
impl<R: Record> EventHandler for DeleteHandler<R> {
    async fn handle(&self, event: IntegrationEvent) {
        match self.process(&event).await {
            Ok(true) => {
                let total = self
                    .metrics
                    .increment(&counter_name(R::PAYLOAD_KEY, "deleted"));
                info!(kind = R::KIND, total, "Measurement deleted");
            }
            Ok(false) => info!(kind = R::KIND, "Nothing to delete"),
            Err(HandlerError::Validation(reason)) => {
                warn!(kind = R::KIND, error = %reason, "Rejected delete");
            }
            Err(other) => error!(kind = R::KIND, error = %other, "Failed to delete measurement"),
        }
    }
}
