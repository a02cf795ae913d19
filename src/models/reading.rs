use chrono::{DateTime, Utc};

/// One sample from the time-series store.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub sensor_id: String,
}

impl Reading {
    pub fn new(sensor_id: &str, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            sensor_id: sensor_id.to_string(),
        }
    }
}

/// Change per minute between the first and last reading of a window.
///
/// Returns 0.0 for windows shorter than two readings or spanning no time.
pub fn rate_per_minute(window: &[Reading]) -> f64 {
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return 0.0;
    };

    let minutes = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;
    if minutes > 0.0 {
        (last.value - first.value) / minutes
    } else {
        0.0
    }
}
