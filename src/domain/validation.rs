// Copyright (c) 2025 - Cowboy AI, Inc.
//! Payload Validation
//!
//! Pure validation functions for measurement payloads, wrapped in
//! [`Validator`] implementations so consumer handlers can take them as
//! injected collaborators.
//!
//! # Rules
//!
//! - **Create**: every field the record needs to be stored is present,
//!   intervals are well-formed, enumerated names are known
//! - **Update**: the natural key fields are present and any other field that
//!   is present obeys the create rules
//! - **Remove**: the record is addressable (`id`, owner)

use chrono::{DateTime, Utc};

use super::activity::LEVEL_NAMES;
use super::{Environment, PhysicalActivity, Record, Sleep};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Why a payload was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// One or more required fields are absent
    #[error("Required fields were not provided: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// A field is present but its value is not acceptable
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Validates a payload before it is written
pub trait Validator<R>: Send + Sync {
    fn validate(&self, record: &R) -> ValidationResult;
}

/// Rules for records about to be created
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateValidator;

/// Rules for records about to be updated
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateValidator;

/// Rules for records about to be removed
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveValidator;

fn require(missing: &mut Vec<&'static str>, field: &'static str, present: bool) {
    if !present {
        missing.push(field);
    }
}

fn finish(missing: Vec<&'static str>) -> ValidationResult {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing))
    }
}

/// Validate a time interval and, when given, its duration in milliseconds
pub fn validate_interval(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration: Option<i64>,
) -> ValidationResult {
    if end_time <= start_time {
        return Err(ValidationError::invalid(
            "end_time",
            "end_time must be later than start_time",
        ));
    }

    if let Some(duration) = duration {
        if duration < 0 {
            return Err(ValidationError::invalid("duration", "duration cannot be negative"));
        }
        let expected = (end_time - start_time).num_milliseconds();
        if duration != expected {
            return Err(ValidationError::invalid(
                "duration",
                format!("duration {duration} does not match the interval of {expected} ms"),
            ));
        }
    }
    Ok(())
}

fn validate_activity_fields(activity: &PhysicalActivity) -> ValidationResult {
    if let (Some(start), Some(end)) = (activity.start_time, activity.end_time) {
        validate_interval(start, end, activity.duration)?;
    }

    if let Some(calories) = activity.calories {
        if !calories.is_finite() || calories < 0.0 {
            return Err(ValidationError::invalid("calories", "calories cannot be negative"));
        }
    }

    if let Some(name) = &activity.name {
        if name.trim().is_empty() {
            return Err(ValidationError::invalid("name", "name cannot be empty"));
        }
    }

    for level in activity.levels.iter().flatten() {
        if !LEVEL_NAMES.contains(&level.name.as_str()) {
            return Err(ValidationError::invalid(
                "levels",
                format!(
                    "unknown level '{}', expected one of: {}",
                    level.name,
                    LEVEL_NAMES.join(", ")
                ),
            ));
        }
        if level.duration < 0 {
            return Err(ValidationError::invalid("levels", "level duration cannot be negative"));
        }
    }
    Ok(())
}

fn validate_sleep_fields(sleep: &Sleep) -> ValidationResult {
    if let (Some(start), Some(end)) = (sleep.start_time, sleep.end_time) {
        validate_interval(start, end, sleep.duration)?;
    }

    if let Some(pattern) = &sleep.pattern {
        if pattern.data_set.is_empty() {
            return Err(ValidationError::invalid(
                "pattern",
                "pattern data_set must contain at least one stage",
            ));
        }

        let names = sleep.sleep_type.unwrap_or_default().stage_names();
        for stage in &pattern.data_set {
            if !names.contains(&stage.name.as_str()) {
                return Err(ValidationError::invalid(
                    "pattern",
                    format!(
                        "unknown stage '{}', expected one of: {}",
                        stage.name,
                        names.join(", ")
                    ),
                ));
            }
            if stage.duration < 0 {
                return Err(ValidationError::invalid(
                    "pattern",
                    "stage duration cannot be negative",
                ));
            }
        }
    }
    Ok(())
}

fn validate_environment_fields(environment: &Environment) -> ValidationResult {
    for measurement in environment.measurements.iter().flatten() {
        if measurement.measurement_type.trim().is_empty() {
            return Err(ValidationError::invalid(
                "measurements",
                "measurement type cannot be empty",
            ));
        }
        if !measurement.value.is_finite() {
            return Err(ValidationError::invalid(
                "measurements",
                format!("{} value is not a number", measurement.measurement_type),
            ));
        }
    }
    Ok(())
}

impl Validator<PhysicalActivity> for CreateValidator {
    fn validate(&self, activity: &PhysicalActivity) -> ValidationResult {
        let mut missing = Vec::new();
        require(&mut missing, "start_time", activity.start_time.is_some());
        require(&mut missing, "end_time", activity.end_time.is_some());
        require(&mut missing, "duration", activity.duration.is_some());
        require(&mut missing, "child_id", activity.child_id.is_some());
        require(&mut missing, "name", activity.name.is_some());
        require(&mut missing, "calories", activity.calories.is_some());
        require(&mut missing, "steps", activity.steps.is_some());
        finish(missing)?;

        validate_activity_fields(activity)
    }
}

impl Validator<Sleep> for CreateValidator {
    fn validate(&self, sleep: &Sleep) -> ValidationResult {
        let mut missing = Vec::new();
        require(&mut missing, "start_time", sleep.start_time.is_some());
        require(&mut missing, "end_time", sleep.end_time.is_some());
        require(&mut missing, "duration", sleep.duration.is_some());
        require(&mut missing, "child_id", sleep.child_id.is_some());
        require(&mut missing, "pattern", sleep.pattern.is_some());
        finish(missing)?;

        validate_sleep_fields(sleep)
    }
}

impl Validator<Environment> for CreateValidator {
    fn validate(&self, environment: &Environment) -> ValidationResult {
        let location = environment.location.as_ref();
        let mut missing = Vec::new();
        require(&mut missing, "institution_id", environment.institution_id.is_some());
        require(&mut missing, "location", location.is_some());
        if let Some(location) = location {
            require(&mut missing, "location.local", location.local.is_some());
            require(&mut missing, "location.room", location.room.is_some());
        }
        require(&mut missing, "measurements", environment.measurements.is_some());
        require(&mut missing, "timestamp", environment.timestamp.is_some());
        finish(missing)?;

        if environment.measurements.as_ref().is_some_and(Vec::is_empty) {
            return Err(ValidationError::invalid(
                "measurements",
                "at least one measurement is required",
            ));
        }
        validate_environment_fields(environment)
    }
}

fn require_address<R: Record>(record: &R) -> ValidationResult {
    let mut missing = Vec::new();
    require(&mut missing, "id", record.id().is_some());
    require(&mut missing, "owner_id", record.owner_id().is_some());
    finish(missing)
}

impl Validator<PhysicalActivity> for UpdateValidator {
    fn validate(&self, activity: &PhysicalActivity) -> ValidationResult {
        let mut missing = Vec::new();
        require(&mut missing, "start_time", activity.start_time.is_some());
        require(&mut missing, "child_id", activity.child_id.is_some());
        finish(missing)?;

        validate_activity_fields(activity)
    }
}

impl Validator<Sleep> for UpdateValidator {
    fn validate(&self, sleep: &Sleep) -> ValidationResult {
        let mut missing = Vec::new();
        require(&mut missing, "start_time", sleep.start_time.is_some());
        require(&mut missing, "child_id", sleep.child_id.is_some());
        finish(missing)?;

        validate_sleep_fields(sleep)
    }
}

impl Validator<PhysicalActivity> for RemoveValidator {
    fn validate(&self, activity: &PhysicalActivity) -> ValidationResult {
        require_address(activity)
    }
}

impl Validator<Sleep> for RemoveValidator {
    fn validate(&self, sleep: &Sleep) -> ValidationResult {
        require_address(sleep)
    }
}

impl Validator<Environment> for RemoveValidator {
    fn validate(&self, environment: &Environment) -> ValidationResult {
        require_address(environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActivityLevel, EnvironmentMeasurement, Location, SleepPattern, SleepPatternDataSet,
        SleepType,
    };
    use chrono::{Duration, TimeZone};
    use test_case::test_case;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 19, 9, 0, 0).unwrap()
    }

    fn activity() -> PhysicalActivity {
        PhysicalActivity {
            start_time: Some(start()),
            end_time: Some(start() + Duration::minutes(30)),
            duration: Some(1_800_000),
            child_id: Some("5a62be07de34500146d9c544".to_string()),
            name: Some("walk".to_string()),
            calories: Some(109.0),
            steps: Some(1_407),
            levels: Some(vec![ActivityLevel {
                name: "lightly".to_string(),
                duration: 1_800_000,
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_activity_passes() {
        assert_eq!(CreateValidator.validate(&activity()), Ok(()));
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let result = CreateValidator.validate(&PhysicalActivity {
            name: Some("run".to_string()),
            ..Default::default()
        });
        assert_eq!(
            result,
            Err(ValidationError::MissingFields(vec![
                "start_time",
                "end_time",
                "duration",
                "child_id",
                "calories",
                "steps"
            ]))
        );
    }

    #[test_case(Some(1_000), "duration" ; "duration mismatch")]
    #[test_case(Some(-1), "duration" ; "negative duration")]
    fn test_interval_rules(duration: Option<i64>, field: &str) {
        let mut bad = activity();
        bad.duration = duration;
        match CreateValidator.validate(&bad) {
            Err(ValidationError::InvalidField { field: got, .. }) => assert_eq!(got, field),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut bad = activity();
        bad.end_time = Some(start() - Duration::minutes(1));
        assert!(matches!(
            CreateValidator.validate(&bad),
            Err(ValidationError::InvalidField { field: "end_time", .. })
        ));
    }

    #[test_case("sedentary", true)]
    #[test_case("very", true)]
    #[test_case("extreme", false)]
    fn test_level_names(name: &str, ok: bool) {
        let mut candidate = activity();
        candidate.levels = Some(vec![ActivityLevel {
            name: name.to_string(),
            duration: 10,
        }]);
        assert_eq!(CreateValidator.validate(&candidate).is_ok(), ok);
    }

    #[test_case(SleepType::Classic, "restless", true)]
    #[test_case(SleepType::Classic, "rem", false)]
    #[test_case(SleepType::Stages, "rem", true)]
    fn test_sleep_stage_names(sleep_type: SleepType, stage: &str, ok: bool) {
        let sleep = Sleep {
            start_time: Some(start()),
            end_time: Some(start() + Duration::hours(8)),
            duration: Some(28_800_000),
            child_id: Some("5a62be07de34500146d9c544".to_string()),
            pattern: Some(SleepPattern {
                data_set: vec![SleepPatternDataSet {
                    start_time: start(),
                    name: stage.to_string(),
                    duration: 60_000,
                }],
            }),
            sleep_type: Some(sleep_type),
            ..Default::default()
        };
        assert_eq!(CreateValidator.validate(&sleep).is_ok(), ok);
    }

    #[test]
    fn test_environment_location_fields_required() {
        let environment = Environment {
            institution_id: Some("5a62be07de34500146d9c624".to_string()),
            location: Some(Location {
                local: Some("indoor".to_string()),
                ..Default::default()
            }),
            measurements: Some(vec![EnvironmentMeasurement {
                measurement_type: "temperature".to_string(),
                value: 21.5,
                unit: "°C".to_string(),
            }]),
            timestamp: Some(start()),
            ..Default::default()
        };
        assert_eq!(
            CreateValidator.validate(&environment),
            Err(ValidationError::MissingFields(vec!["location.room"]))
        );
    }

    #[test]
    fn test_update_requires_natural_key_only() {
        let partial = PhysicalActivity {
            start_time: Some(start()),
            child_id: Some("5a62be07de34500146d9c544".to_string()),
            steps: Some(2_000),
            ..Default::default()
        };
        assert_eq!(UpdateValidator.validate(&partial), Ok(()));

        let keyless = PhysicalActivity {
            steps: Some(2_000),
            ..Default::default()
        };
        assert_eq!(
            UpdateValidator.validate(&keyless),
            Err(ValidationError::MissingFields(vec!["start_time", "child_id"]))
        );
    }

    #[test]
    fn test_remove_requires_address() {
        let mut candidate = activity();
        assert_eq!(
            RemoveValidator.validate(&candidate),
            Err(ValidationError::MissingFields(vec!["id"]))
        );

        candidate.id = Some("5a62be07d6f33400146c9b61".to_string());
        assert_eq!(RemoveValidator.validate(&candidate), Ok(()));
    }

    #[test]
    fn test_remove_environment_requires_institution() {
        assert_eq!(
            RemoveValidator.validate(&Environment::default()),
            Err(ValidationError::MissingFields(vec!["id", "owner_id"]))
        );
    }
}
