//! Connectivity state machine for the body sensor.
//!
//! Each cycle the tracker looks at the recent primary window (the worn
//! sensor) and, when available, the reference window (room sensor) and
//! decides whether the sensor is worn, removed, or worn but not touching
//! skin. Right after attachment the tracker enters a stabilization mode:
//! the state reads `Connected`, but temperature classification should be held
//! back until readings settle.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::TemperatureConfig;
use crate::models::reading::rate_per_minute;
use crate::models::{Reading, SensorState};

/// °F per minute a connected sensor must fall by to count as removed.
pub const DISCONNECT_RATE: f64 = -1.0;

/// °F per minute a disconnected sensor must rise by to count as attached.
pub const CONNECT_RATE: f64 = 0.5;

#[derive(Debug, Default)]
pub struct SensorStateTracker {
    state: SensorState,
    stabilizing_since: Option<DateTime<Utc>>,
}

impl SensorStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the next state from the current windows. Only the
    /// stabilization timer is updated here; the public state changes through
    /// [`update_state`](Self::update_state).
    pub fn determine_state(
        &mut self,
        primary: &[Reading],
        reference: &[Reading],
        config: &TemperatureConfig,
        now: DateTime<Utc>,
    ) -> SensorState {
        let Some(last) = primary.last() else {
            return SensorState::Disconnected;
        };

        let latest = last.value + config.calibration_offset;
        let room_temp = reference.last().map(|r| r.value);
        let near_room = |room: f64| (latest - room).abs() < config.room_temp_threshold;

        if self.state != SensorState::Unknown && primary.len() >= 2 {
            let rate = rate_per_minute(primary);
            debug!(
                "Sensor {} at {:.2}°F, rate {:.3}°F/min over {} readings",
                self.state,
                latest,
                rate,
                primary.len()
            );

            if let Some(since) = self.stabilizing_since {
                let elapsed = seconds_between(since, now);
                if elapsed >= config.min_stabilization_time as f64
                    && rate.abs() < config.stabilization_threshold
                {
                    info!(
                        "Exiting stabilization mode: rate of change {:.3}°F/min is below threshold {:.3}°F/min",
                        rate, config.stabilization_threshold
                    );
                    self.stabilizing_since = None;

                    if latest >= config.min_realistic_temp {
                        return SensorState::Connected;
                    }
                    if elapsed > config.misposition_time_threshold as f64 * 60.0 {
                        return SensorState::Mispositioned;
                    }
                }
            }

            match self.state {
                SensorState::Connected => {
                    if rate < DISCONNECT_RATE {
                        return SensorState::Disconnected;
                    }
                    if room_temp.is_some_and(near_room) {
                        return SensorState::Disconnected;
                    }
                }
                SensorState::Disconnected if rate > CONNECT_RATE => {
                    info!("Entering stabilization mode");
                    self.stabilizing_since = Some(now);
                    return SensorState::Connected;
                }
                _ => {}
            }
        }

        // A single reading while connected also lands here, so a fast removal
        // can still read as connected until a second reading arrives.
        if latest >= config.min_realistic_temp {
            SensorState::Connected
        } else if room_temp.is_some_and(near_room) {
            SensorState::Disconnected
        } else {
            SensorState::Unknown
        }
    }

    /// Store `next` and report whether it differs from the previous state.
    pub fn update_state(&mut self, next: SensorState) -> bool {
        if next == self.state {
            return false;
        }
        info!("Sensor state changed: {} -> {}", self.state, next);
        self.state = next;
        true
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn is_stabilizing(&self) -> bool {
        self.stabilizing_since.is_some()
    }

    pub fn stabilizing_since(&self) -> Option<DateTime<Utc>> {
        self.stabilizing_since
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
