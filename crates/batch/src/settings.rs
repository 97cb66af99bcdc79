//! Persisted operator settings
//!
//! Settings are stored as a small JSON document that may have been edited by
//! hand or written by an older version. Loading never fails: numeric fields
//! accept numbers or numeric strings, out-of-range values are clamped, and
//! anything missing or unreadable falls back to the default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{BatchConfig, CONCURRENCY_RANGE, INTERVAL_MS_RANGE, RETRY_COUNT_RANGE};

/// Operator settings as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Concurrent workers (1-5)
    pub concurrency: usize,

    /// Minimum gap between one worker's requests in ms (100-10000)
    pub interval_ms: u64,

    /// Retries per item (0-5)
    pub retry_count: u32,

    /// Whether the caller should refresh its view after a completed run
    pub auto_refresh: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let config = BatchConfig::default();
        Self {
            concurrency: config.concurrency(),
            interval_ms: config.interval().as_millis() as u64,
            retry_count: config.retry_count(),
            auto_refresh: true,
        }
    }
}

impl Settings {
    /// Load settings from a stored JSON document
    ///
    /// An empty or unparsable document yields the defaults.
    pub fn from_json(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::from_map(&map),
            _ => Self::default(),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            concurrency: clamp_int(
                map.get("concurrency"),
                *CONCURRENCY_RANGE.start() as i64,
                *CONCURRENCY_RANGE.end() as i64,
                defaults.concurrency as i64,
            ) as usize,
            interval_ms: clamp_int(
                map.get("intervalMs"),
                *INTERVAL_MS_RANGE.start() as i64,
                *INTERVAL_MS_RANGE.end() as i64,
                defaults.interval_ms as i64,
            ) as u64,
            retry_count: clamp_int(
                map.get("retryCount"),
                *RETRY_COUNT_RANGE.start() as i64,
                *RETRY_COUNT_RANGE.end() as i64,
                defaults.retry_count as i64,
            ) as u32,
            // A stored document without the flag predates it and meant "off"
            auto_refresh: map.get("autoRefresh").is_some_and(truthy),
        }
    }

    /// Serialize for storage
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Return a copy with every field forced into range
    pub fn clamped(&self) -> Self {
        let config = self.to_config();
        Self {
            concurrency: config.concurrency(),
            interval_ms: config.interval().as_millis() as u64,
            retry_count: config.retry_count(),
            auto_refresh: self.auto_refresh,
        }
    }

    /// Build the batch configuration these settings describe
    pub fn to_config(&self) -> BatchConfig {
        BatchConfig::default()
            .with_concurrency(self.concurrency)
            .with_interval_ms(self.interval_ms)
            .with_retry_count(self.retry_count)
    }
}

/// Parse an integer leniently and clamp it into `[min, max]`
///
/// Numbers are truncated toward zero; strings contribute their leading
/// integer (`"12ms"` is 12). Anything else yields `fallback`.
fn clamp_int(value: Option<&Value>, min: i64, max: i64, fallback: i64) -> i64 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => leading_int(s),
        _ => None,
    };
    parsed.map_or(fallback, |n| n.clamp(min, max))
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * magnitude)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.interval_ms, 500);
        assert_eq!(settings.retry_count, 2);
        assert!(settings.auto_refresh);
    }

    #[test]
    fn test_empty_or_invalid_document_yields_defaults() {
        assert_eq!(Settings::from_json(""), Settings::default());
        assert_eq!(Settings::from_json("not json"), Settings::default());
        assert_eq!(Settings::from_json("[1, 2]"), Settings::default());
    }

    #[test]
    fn test_values_are_clamped() {
        let settings = Settings::from_json(
            r#"{"concurrency": 12, "intervalMs": 5, "retryCount": -3, "autoRefresh": true}"#,
        );

        assert_eq!(settings.concurrency, 5);
        assert_eq!(settings.interval_ms, 100);
        assert_eq!(settings.retry_count, 0);
        assert!(settings.auto_refresh);
    }

    #[test]
    fn test_numeric_strings_and_floats() {
        let settings =
            Settings::from_json(r#"{"concurrency": "3", "intervalMs": "750ms", "retryCount": 1.9}"#);

        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.interval_ms, 750);
        assert_eq!(settings.retry_count, 1);
    }

    #[test]
    fn test_non_numeric_falls_back_per_field() {
        let settings =
            Settings::from_json(r#"{"concurrency": "lots", "intervalMs": null, "retryCount": 4}"#);

        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.interval_ms, 500);
        assert_eq!(settings.retry_count, 4);
    }

    #[test]
    fn test_missing_auto_refresh_is_off() {
        let settings = Settings::from_json(r#"{"concurrency": 2}"#);
        assert!(!settings.auto_refresh);
    }

    #[test]
    fn test_round_trip_through_storage() {
        let settings = Settings {
            concurrency: 4,
            interval_ms: 1200,
            retry_count: 3,
            auto_refresh: false,
        };

        assert_eq!(Settings::from_json(&settings.to_json()), settings);
    }

    #[test]
    fn test_to_config() {
        let settings = Settings::from_json(r#"{"concurrency": 2, "intervalMs": 300, "retryCount": 5}"#);
        let config = settings.to_config();

        assert_eq!(config.concurrency(), 2);
        assert_eq!(config.interval(), Duration::from_millis(300));
        assert_eq!(config.retry_count(), 5);
    }

    #[test]
    fn test_clamped() {
        let settings = Settings {
            concurrency: 0,
            interval_ms: 1,
            retry_count: 99,
            auto_refresh: true,
        };

        let clamped = settings.clamped();
        assert_eq!(clamped.concurrency, 1);
        assert_eq!(clamped.interval_ms, 100);
        assert_eq!(clamped.retry_count, 5);
    }
}
