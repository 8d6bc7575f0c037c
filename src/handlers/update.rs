// Copyright (c) 2025 - Cowboy AI, Inc.
//! Update handler: apply a change to the record with the same natural key

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{counter_name, HandlerError};
use crate::domain::{Record, Validator};
use crate::event_bus::EventHandler;
use crate::events::IntegrationEvent;
use crate::metrics::MetricsSink;
use crate::repository::MeasurementRepository;

/// Applies the record carried by a `*UpdateEvent`
pub struct UpdateHandler<R: Record> {
    repository: Arc<dyn MeasurementRepository<R>>,
    validator: Arc<dyn Validator<R>>,
    metrics: Arc<dyn MetricsSink>,
}

impl<R: Record> UpdateHandler<R> {
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

    /// The updated record, or `None` when nothing matched or nothing changed
    pub async fn process(&self, event: &IntegrationEvent) -> Result<Option<R>, HandlerError> {
        let record: R = event.payload_as(R::PAYLOAD_KEY)?;
        self.validator.validate(&record)?;
        Ok(self.repository.update_by_natural_key(record).await?)
    }
}

#[async_trait]
impl<R: Record> EventHandler for UpdateHandler<R> {
    async fn handle(&self, event: IntegrationEvent) {
        match self.process(&event).await {
            Ok(Some(updated)) => {
                let total = self
                    .metrics
                    .increment(&counter_name(R::PAYLOAD_KEY, "updated"));
                info!(
                    kind = R::KIND,
                    id = updated.id().unwrap_or_default(),
                    total,
                    "Measurement updated"
                );
            }
            Ok(None) => {
                info!(kind = R::KIND, "No stored measurement changed by update");
            }
            Err(HandlerError::Validation(reason)) => {
                warn!(kind = R::KIND, error = %reason, "Rejected invalid update");
            }
            Err(other) => {
                error!(kind = R::KIND, error = %other, "Failed to update measurement");
            }
        }
    }
}
