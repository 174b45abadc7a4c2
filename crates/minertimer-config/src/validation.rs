//! Configuration validation

use crate::schema::{RawConfig, RawLimitsConfig, RawMqttConfig};
use crate::settings::DEFAULT_MAX_MINUTES;
use minertimer_util::is_topic_safe;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("[service] {0}")]
    ServiceError(String),

    #[error("[process] {0}")]
    ProcessError(String),

    #[error("[limits] {field} = {value}: {message}")]
    LimitOutOfRange {
        field: &'static str,
        value: f64,
        message: String,
    },

    #[error("[limits] warning threshold {0} minutes: {1}")]
    InvalidWarning(u32, String),

    #[error("[mqtt] {0}")]
    MqttError(String),
}

/// Validate a raw configuration, returning every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.service.tick_interval_ms == Some(0) {
        errors.push(ValidationError::ServiceError(
            "tick_interval_ms must be greater than 0".into(),
        ));
    }

    if let Some(pattern) = &config.process.pattern
        && pattern.trim().is_empty()
    {
        errors.push(ValidationError::ProcessError(
            "pattern cannot be empty".into(),
        ));
    }

    errors.extend(validate_limits(&config.limits));
    errors.extend(validate_mqtt(&config.mqtt));

    errors
}

fn validate_limits(limits: &RawLimitsConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let max = limits.max_minutes.unwrap_or(DEFAULT_MAX_MINUTES);
    if !max.is_finite() || max <= 0.0 {
        errors.push(ValidationError::LimitOutOfRange {
            field: "max_minutes",
            value: max,
            message: "must be greater than 0".into(),
        });
    }

    let bounded = [
        ("weekday_minutes", limits.weekday_minutes),
        ("weekend_minutes", limits.weekend_minutes),
        ("request_more_minutes", limits.request_more_minutes),
    ];
    for (field, value) in bounded {
        let Some(value) = value else { continue };
        if !value.is_finite() || value < 0.0 {
            errors.push(ValidationError::LimitOutOfRange {
                field,
                value,
                message: "must be a non-negative number".into(),
            });
        } else if value > max {
            errors.push(ValidationError::LimitOutOfRange {
                field,
                value,
                message: format!("must not exceed max_minutes ({})", max),
            });
        }
    }

    if let Some(warnings) = &limits.warning_minutes {
        let mut seen = HashSet::new();
        for &minutes in warnings {
            if minutes == 0 {
                errors.push(ValidationError::InvalidWarning(
                    minutes,
                    "must be greater than 0".into(),
                ));
            } else if !seen.insert(minutes) {
                errors.push(ValidationError::InvalidWarning(
                    minutes,
                    "listed more than once".into(),
                ));
            }
        }
    }

    errors
}

fn validate_mqtt(mqtt: &RawMqttConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if mqtt.port == Some(0) {
        errors.push(ValidationError::MqttError("port cannot be 0".into()));
    }

    if let Some(host) = &mqtt.host
        && host.trim().is_empty()
    {
        errors.push(ValidationError::MqttError("host cannot be empty".into()));
    }

    let topic_levels = [
        ("device_id", &mqtt.device_id),
        ("topic_prefix", &mqtt.topic_prefix),
        ("discovery_prefix", &mqtt.discovery_prefix),
    ];
    for (field, value) in topic_levels {
        if let Some(value) = value
            && !is_topic_safe(value)
        {
            errors.push(ValidationError::MqttError(format!(
                "{} '{}' may only contain letters, digits, '_' or '-'",
                field, value
            )));
        }
    }

    if mqtt.reconnect_seconds == Some(0) {
        errors.push(ValidationError::MqttError(
            "reconnect_seconds must be greater than 0".into(),
        ));
    }

    if mqtt.username.is_none() && mqtt.password.is_some() {
        errors.push(ValidationError::MqttError(
            "password given without username".into(),
        ));
    }

    errors
}
