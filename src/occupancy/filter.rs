use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::upstream::RawObservation;

/// Thresholds deciding whether a device observation counts as a patron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Weakest accepted signal, inclusive.
    pub rssi_min: i64,
    /// Upper signal bound, exclusive. Readings at or above it are sensor noise.
    pub rssi_max_exclusive: i64,
    pub max_seen_age_secs: u64,
    /// Case-insensitive SSID fragments whose traffic is not patron traffic.
    pub excluded_ssid_fragments: Vec<String>,
    pub exclude_guest_users: bool,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            rssi_min: -70,
            rssi_max_exclusive: -1,
            max_seen_age_secs: 30 * 60,
            excluded_ssid_fragments: vec!["visitor".into(), "gaming".into()],
            exclude_guest_users: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Rssi,
    Stale,
    ExcludedNetwork,
    Guest,
}

impl FilterRules {
    pub fn valid_rssi(&self, rssi: Option<i64>) -> bool {
        matches!(rssi, Some(value) if value >= self.rssi_min && value < self.rssi_max_exclusive)
    }

    /// Device was seen strictly less than `max_seen_age_secs` before the server's clock.
    pub fn valid_time(
        &self,
        server_time: Option<DateTime<FixedOffset>>,
        last_seen: Option<DateTime<FixedOffset>>,
    ) -> bool {
        let (Some(server), Some(seen)) = (server_time, last_seen) else {
            return false;
        };
        let max_age = Duration::seconds(i64::try_from(self.max_seen_age_secs).unwrap_or(i64::MAX));
        server.signed_duration_since(seen) < max_age
    }

    pub fn valid_network(&self, ssid: Option<&str>) -> bool {
        let Some(ssid) = ssid else {
            return false;
        };
        let ssid = ssid.to_lowercase();
        !self
            .excluded_ssid_fragments
            .iter()
            .any(|fragment| ssid.contains(&fragment.to_lowercase()))
    }

    pub fn check(&self, observation: &RawObservation) -> Result<(), Rejection> {
        if !self.valid_rssi(observation.rssi()) {
            return Err(Rejection::Rssi);
        }
        if !self.valid_time(observation.server_time(), observation.last_seen_at()) {
            return Err(Rejection::Stale);
        }
        if !self.valid_network(observation.ssid.as_deref()) {
            return Err(Rejection::ExcludedNetwork);
        }
        if self.exclude_guest_users && observation.is_guest() {
            return Err(Rejection::Guest);
        }
        Ok(())
    }

    pub fn is_valid(&self, observation: &RawObservation) -> bool {
        self.check(observation).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::models::{DetectedRssi, LocationCoordinate, Statistics};
    use serde_json::json;

    fn ts(raw: &str) -> Option<DateTime<FixedOffset>> {
        Some(DateTime::parse_from_rfc3339(raw).unwrap())
    }

    fn device(rssi: serde_json::Value, last_seen: &str, ssid: &str) -> RawObservation {
        RawObservation {
            username: Some("patron".into()),
            ssid: Some(ssid.into()),
            last_seen: Some(json!(last_seen)),
            statistics: Some(Statistics {
                current_server_time: Some(json!("2026-10-14T12:00:00-04:00")),
            }),
            max_detected_rssi: Some(DetectedRssi { rssi: Some(rssi) }),
            location_coordinate: Some(LocationCoordinate {
                x: Some(50.0),
                y: Some(50.0),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn rssi_window_is_half_open() {
        let rules = FilterRules::default();
        for s in -100..=10 {
            assert_eq!(rules.valid_rssi(Some(s)), (-70..-1).contains(&s), "rssi {s}");
        }
        assert!(!rules.valid_rssi(None));
    }

    #[test]
    fn presence_older_than_thirty_minutes_is_stale() {
        let rules = FilterRules::default();
        let server = ts("2026-10-14T12:00:00-04:00");
        assert!(rules.valid_time(server, ts("2026-10-14T11:50:00-04:00")));
        assert!(rules.valid_time(server, ts("2026-10-14T11:30:00.001-04:00")));
        assert!(!rules.valid_time(server, ts("2026-10-14T11:30:00-04:00")));
        assert!(!rules.valid_time(server, ts("2026-10-14T11:20:00-04:00")));
        assert!(!rules.valid_time(None, ts("2026-10-14T11:50:00-04:00")));
    }

    #[test]
    fn excluded_networks_match_case_insensitively() {
        let rules = FilterRules::default();
        assert!(rules.valid_network(Some("campus-secure")));
        assert!(!rules.valid_network(Some("Library-VISITOR")));
        assert!(!rules.valid_network(Some("xGamingNet")));
        assert!(!rules.valid_network(None));
    }

    #[test]
    fn check_reports_first_failing_rule() {
        let rules = FilterRules::default();
        let ok = device(json!(-55), "2026-10-14T11:59:00-04:00", "campus");
        assert_eq!(rules.check(&ok), Ok(()));

        let weak = device(json!(-80), "2026-10-14T11:59:00-04:00", "campus");
        assert_eq!(rules.check(&weak), Err(Rejection::Rssi));

        let garbled = device(json!("n/a"), "2026-10-14T11:59:00-04:00", "campus");
        assert_eq!(rules.check(&garbled), Err(Rejection::Rssi));

        let stale = device(json!(-55), "2026-10-14T10:00:00-04:00", "campus");
        assert_eq!(rules.check(&stale), Err(Rejection::Stale));

        let visitor = device(json!(-55), "2026-10-14T11:59:00-04:00", "visitor");
        assert_eq!(rules.check(&visitor), Err(Rejection::ExcludedNetwork));
    }

    #[test]
    fn guests_only_rejected_when_enabled() {
        let mut guest = device(json!(-55), "2026-10-14T11:59:00-04:00", "campus");
        guest.guest_user = Some(true);

        assert!(FilterRules::default().is_valid(&guest));
        let strict = FilterRules {
            exclude_guest_users: true,
            ..FilterRules::default()
        };
        assert_eq!(strict.check(&guest), Err(Rejection::Guest));
    }

    #[test]
    fn empty_record_is_rejected_without_panicking() {
        assert!(!FilterRules::default().is_valid(&RawObservation::default()));
    }
}
