//! State encoding and inbound command decoding

use chrono::{DateTime, Local};
use minertimer_api::{StatePublication, ValueKind};
use minertimer_config::StateFormat;
use minertimer_util::{local_from_epoch_secs, local_midnight};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed or out-of-range inbound payload
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("payload is not UTF-8")]
    NotUtf8,

    #[error("payload is neither a number nor {{\"value\", \"timestamp\"}}: {0:?}")]
    Malformed(String),

    #[error("value is not finite")]
    NonFinite,

    #[error("value {0} is negative")]
    Negative(f64),

    #[error("value {value} exceeds maximum {max}")]
    AboveMax { value: f64, max: f64 },

    #[error("timestamp {0} is out of range")]
    BadTimestamp(f64),
}

/// Why an inbound message was not applied
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InboundRejection {
    #[error("not connected")]
    NotConnected,

    #[error("topic is not a command topic")]
    UnknownTopic,

    #[error("{0} cannot be set remotely")]
    ReadOnly(ValueKind),

    #[error("decode failed: {0}")]
    Decode(#[from] PayloadError),

    #[error("message from {0} predates today")]
    Stale(DateTime<Local>),
}

#[derive(Debug, Serialize, Deserialize)]
struct TimestampedValue {
    value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<f64>,
}

/// A decoded command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InboundValue {
    pub value: f64,
    pub timestamp: Option<DateTime<Local>>,
}

/// Decode `{"value": n, "timestamp": secs}` or a bare decimal number
pub fn decode_command(payload: &[u8]) -> Result<InboundValue, PayloadError> {
    let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
    let text = text.trim();

    if let Ok(parsed) = serde_json::from_str::<TimestampedValue>(text) {
        let timestamp = match parsed.timestamp {
            Some(secs) => {
                Some(local_from_epoch_secs(secs).ok_or(PayloadError::BadTimestamp(secs))?)
            }
            None => None,
        };
        return Ok(InboundValue {
            value: parsed.value,
            timestamp,
        });
    }

    text.parse::<f64>()
        .map(|value| InboundValue {
            value,
            timestamp: None,
        })
        .map_err(|_| PayloadError::Malformed(text.chars().take(64).collect()))
}

/// Range check for a minutes value
pub fn check_range(value: f64, max: f64) -> Result<f64, PayloadError> {
    if !value.is_finite() {
        Err(PayloadError::NonFinite)
    } else if value < 0.0 {
        Err(PayloadError::Negative(value))
    } else if value > max {
        Err(PayloadError::AboveMax { value, max })
    } else {
        Ok(value)
    }
}

/// Decode, then drop anything timestamped before today's local midnight
/// and anything out of range.
pub fn validate_command(
    payload: &[u8],
    now: DateTime<Local>,
    max: f64,
) -> Result<f64, InboundRejection> {
    let inbound = decode_command(payload)?;

    if let Some(timestamp) = inbound.timestamp
        && timestamp < local_midnight(&now)
    {
        return Err(InboundRejection::Stale(timestamp));
    }

    Ok(check_range(inbound.value, max)?)
}

/// Render minutes with at most two decimals and no trailing zeros
fn format_minutes(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Encode a value for its state topic
pub fn encode_state(publication: &StatePublication, format: StateFormat) -> String {
    match format {
        StateFormat::Plain => format_minutes(publication.value),
        StateFormat::Json => {
            let body = TimestampedValue {
                value: round2(publication.value),
                timestamp: Some(publication.timestamp.timestamp_millis() as f64 / 1000.0),
            };
            // Serializing two plain f64 fields cannot fail
            serde_json::to_string(&body).unwrap_or_else(|_| format_minutes(publication.value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 24, 12, 0, 0).unwrap()
    }

    #[test]
    fn decodes_bare_number() {
        assert_eq!(decode_command(b"90").unwrap().value, 90.0);
        assert_eq!(decode_command(b" 42.5\n").unwrap().value, 42.5);
        assert!(decode_command(b"90").unwrap().timestamp.is_none());
    }

    #[test]
    fn decodes_json_with_timestamp() {
        let ts = noon().timestamp();
        let payload = format!(r#"{{"value": 75, "timestamp": {}}}"#, ts);
        let inbound = decode_command(payload.as_bytes()).unwrap();

        assert_eq!(inbound.value, 75.0);
        assert_eq!(inbound.timestamp.unwrap(), noon());
    }

    #[test]
    fn decodes_json_without_timestamp() {
        let inbound = decode_command(br#"{"value": 30}"#).unwrap();
        assert_eq!(inbound.value, 30.0);
        assert!(inbound.timestamp.is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_command(b"lots"), Err(PayloadError::Malformed(_))));
        assert!(matches!(decode_command(&[0xff, 0xfe]), Err(PayloadError::NotUtf8)));
        assert!(matches!(
            decode_command(br#"{"minutes": 5}"#),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn stale_messages_rejected() {
        let yesterday = Local.with_ymd_and_hms(2025, 12, 23, 23, 59, 0).unwrap();
        let payload = format!(r#"{{"value": 200, "timestamp": {}}}"#, yesterday.timestamp());

        assert!(matches!(
            validate_command(payload.as_bytes(), noon(), 1440.0),
            Err(InboundRejection::Stale(_))
        ));
    }

    #[test]
    fn todays_messages_accepted() {
        let earlier = Local.with_ymd_and_hms(2025, 12, 24, 0, 0, 5).unwrap();
        let payload = format!(r#"{{"value": 200, "timestamp": {}}}"#, earlier.timestamp());

        assert_eq!(validate_command(payload.as_bytes(), noon(), 1440.0), Ok(200.0));
        assert_eq!(validate_command(b"90", noon(), 1440.0), Ok(90.0));
    }

    #[test]
    fn range_checked() {
        assert!(matches!(
            validate_command(b"-1", noon(), 1440.0),
            Err(InboundRejection::Decode(PayloadError::Negative(_)))
        ));
        assert!(matches!(
            validate_command(b"1441", noon(), 1440.0),
            Err(InboundRejection::Decode(PayloadError::AboveMax { .. }))
        ));
        assert!(matches!(
            validate_command(b"NaN", noon(), 1440.0),
            Err(InboundRejection::Decode(PayloadError::NonFinite))
        ));
    }

    #[test]
    fn plain_encoding() {
        let p = |value| StatePublication {
            kind: ValueKind::PlayedTime,
            value,
            timestamp: noon(),
        };
        assert_eq!(encode_state(&p(60.0), StateFormat::Plain), "60");
        assert_eq!(encode_state(&p(59.9), StateFormat::Plain), "59.9");
        assert_eq!(encode_state(&p(12.345), StateFormat::Plain), "12.35");
        assert_eq!(encode_state(&p(0.0), StateFormat::Plain), "0");
    }

    #[test]
    fn json_encoding_decodes_back() {
        let publication = StatePublication {
            kind: ValueKind::CurrentLimit,
            value: 90.0,
            timestamp: noon(),
        };
        let encoded = encode_state(&publication, StateFormat::Json);
        let decoded = decode_command(encoded.as_bytes()).unwrap();

        assert_eq!(decoded.value, 90.0);
        assert_eq!(decoded.timestamp.unwrap(), noon());
    }
}
