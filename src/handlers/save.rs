// Copyright (c) 2025 - Cowboy AI, Inc.
//! Save handler: create a record once per natural key

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{counter_name, HandlerError};
use crate::domain::{Record, Validator};
use crate::event_bus::EventHandler;
use crate::events::IntegrationEvent;
use crate::metrics::MetricsSink;
use crate::repository::MeasurementRepository;

/// Stores the record carried by a `*SaveEvent`
pub struct SaveHandler<R: Record> {
    repository: Arc<dyn MeasurementRepository<R>>,
    validator: Arc<dyn Validator<R>>,
    metrics: Arc<dyn MetricsSink>,
}

impl<R: Record> SaveHandler<R> {
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

    /// Run the pipeline and report the outcome
    ///
    /// # Errors
    ///
    /// [`HandlerError::Conflict`] when a record with the same natural key is
    /// already stored, otherwise the step that failed.
    pub async fn process(&self, event: &IntegrationEvent) -> Result<R, HandlerError> {
        let record: R = event.payload_as(R::PAYLOAD_KEY)?;
        self.validator.validate(&record)?;

        if self.repository.check_exist(&record).await? {
            let key = record
                .natural_key()
                .map(|key| key.to_string())
                .unwrap_or_default();
            return Err(HandlerError::Conflict(key));
        }

        Ok(self.repository.create(record).await?)
    }
}

#[async_trait]
impl<R: Record> EventHandler for SaveHandler<R> {
    async fn handle(&self, event: IntegrationEvent) {
        match self.process(&event).await {
            Ok(created) => {
                let total = self.metrics.increment(&counter_name(R::PAYLOAD_KEY, "saved"));
                info!(
                    kind = R::KIND,
                    id = created.id().unwrap_or_default(),
                    total,
                    "Measurement saved"
                );
            }
            Err(HandlerError::Conflict(key)) => {
                info!(kind = R::KIND, natural_key = %key, "Measurement already stored, skipping");
            }
            Err(HandlerError::Validation(reason)) => {
                warn!(kind = R::KIND, event_name = %event.event_name, error = %reason, "Rejected invalid measurement");
            }
            Err(other) => {
                error!(kind = R::KIND, event_name = %event.event_name, error = %other, "Failed to save measurement");
            }
        }
    }
}
