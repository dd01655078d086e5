//! Wire model for one device record returned by the presence API.
//!
//! Every field is optional: a record missing something the filter needs is
//! rejected by the filter, never treated as a decode failure for the batch.

use anyhow::{bail, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::occupancy::Coordinate;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub username: Option<String>,
    pub mac_address: Option<String>,
    pub ssid: Option<String>,
    pub guest_user: Option<bool>,
    pub last_seen: Option<Value>,
    pub statistics: Option<Statistics>,
    pub max_detected_rssi: Option<DetectedRssi>,
    pub location_coordinate: Option<LocationCoordinate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub current_server_time: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectedRssi {
    pub rssi: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationCoordinate {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl RawObservation {
    /// Lowercased username, falling back to the MAC address.
    pub fn identity(&self) -> Option<String> {
        [self.username.as_deref(), self.mac_address.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_lowercase)
    }

    pub fn rssi(&self) -> Option<i64> {
        self.max_detected_rssi
            .as_ref()
            .and_then(|detected| detected.rssi.as_ref())
            .and_then(parse_rssi)
    }

    pub fn server_time(&self) -> Option<DateTime<FixedOffset>> {
        self.statistics
            .as_ref()
            .and_then(|stats| stats.current_server_time.as_ref())
            .and_then(parse_timestamp)
    }

    pub fn last_seen_at(&self) -> Option<DateTime<FixedOffset>> {
        self.last_seen.as_ref().and_then(parse_timestamp)
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        let location = self.location_coordinate.as_ref()?;
        Some(Coordinate::new(location.x?, location.y?))
    }

    pub fn is_guest(&self) -> bool {
        self.guest_user.unwrap_or(false)
    }
}

/// Integer-prefix parse: `-55`, `-55.9` and `"-55dBm"` all read as -55.
pub fn parse_rssi(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(raw) => parse_integer_prefix(raw),
        _ => None,
    }
}

fn parse_integer_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first()? {
        b'-' => (-1, &trimmed[1..]),
        b'+' => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|v| v * sign)
}

/// Accepts RFC 3339, ISO 8601 with a `+hhmm` offset, or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .ok(),
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.fixed_offset()),
        _ => None,
    }
}

/// A decoded floor response: records that parsed plus the count that did not.
#[derive(Debug, Default)]
pub struct ObservationBatch {
    pub observations: Vec<RawObservation>,
    pub malformed: usize,
}

pub fn decode_batch(body: Value) -> Result<ObservationBatch> {
    let Value::Array(items) = body else {
        bail!("presence API response is not a JSON array");
    };

    let mut batch = ObservationBatch {
        observations: Vec::with_capacity(items.len()),
        malformed: 0,
    };
    for item in items {
        match serde_json::from_value::<RawObservation>(item) {
            Ok(observation) => batch.observations.push(observation),
            Err(_) => batch.malformed += 1,
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rssi_follows_integer_prefix_rules() {
        assert_eq!(parse_rssi(&json!(-50)), Some(-50));
        assert_eq!(parse_rssi(&json!(-50.9)), Some(-50));
        assert_eq!(parse_rssi(&json!("-61dBm")), Some(-61));
        assert_eq!(parse_rssi(&json!(" -7")), Some(-7));
        assert_eq!(parse_rssi(&json!("not a number")), None);
        assert_eq!(parse_rssi(&json!("-")), None);
        assert_eq!(parse_rssi(&json!(null)), None);
        assert_eq!(parse_rssi(&json!(true)), None);
    }

    #[test]
    fn timestamps_in_api_formats_parse() {
        let rfc = parse_timestamp(&json!("2026-10-14T10:15:00-04:00")).unwrap();
        let compact = parse_timestamp(&json!("2026-10-14T10:15:00.000-0400")).unwrap();
        assert_eq!(rfc, compact);

        let millis = parse_timestamp(&json!(rfc.timestamp_millis())).unwrap();
        assert_eq!(millis, rfc);

        assert!(parse_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn identity_prefers_username_then_mac() {
        let mut obs = RawObservation {
            username: Some("  JDoe ".into()),
            mac_address: Some("AA:BB".into()),
            ..Default::default()
        };
        assert_eq!(obs.identity().as_deref(), Some("jdoe"));

        obs.username = Some(String::new());
        assert_eq!(obs.identity().as_deref(), Some("aa:bb"));

        obs.mac_address = None;
        assert_eq!(obs.identity(), None);
    }

    #[test]
    fn bad_records_are_counted_not_fatal() {
        let body = json!([
            { "username": "a", "locationCoordinate": { "x": 1.0, "y": 2.0 } },
            { "username": "b", "locationCoordinate": { "x": "east", "y": 2.0 } },
            "garbage"
        ]);
        let batch = decode_batch(body).unwrap();
        assert_eq!(batch.observations.len(), 1);
        assert_eq!(batch.malformed, 2);
        assert!(decode_batch(json!({ "error": "nope" })).is_err());
    }
}
