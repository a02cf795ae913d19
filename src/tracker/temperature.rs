use log::info;

use super::classifier::classify;
use crate::alerts::{AlertPayload, Colour};
use crate::config::TemperatureConfig;
use crate::models::TemperatureState;

/// Remembers the last two temperature bands and reports band changes.
#[derive(Debug, Default)]
pub struct TemperatureTracker {
    current: Option<TemperatureState>,
    previous: Option<TemperatureState>,
}

impl TemperatureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a raw reading. Returns true when the band changed from an
    /// earlier band; the very first classification never counts as a change.
    pub fn update(&mut self, raw_temperature: f64, config: &TemperatureConfig) -> bool {
        let calibrated = raw_temperature + config.calibration_offset;
        let state = classify(calibrated, config);

        if self.current == Some(state) {
            return false;
        }

        self.previous = self.current.replace(state);
        match self.previous {
            Some(previous) => {
                info!("Temperature state changed: {} -> {} ({:.1}°F)", previous, state, calibrated);
                true
            }
            None => {
                info!("Initial temperature state: {} ({:.1}°F)", state, calibrated);
                false
            }
        }
    }

    pub fn alert_payload(&self, raw_temperature: f64, config: &TemperatureConfig) -> Option<AlertPayload> {
        let state = self.current?;
        let calibrated = raw_temperature + config.calibration_offset;

        let (range, colour) = match state {
            TemperatureState::Cold => (format!("below {}°F", bound(config.cold_max)), Colour::Blue),
            TemperatureState::Cool => (
                format!("{}-{}°F", bound(config.cold_max), bound(config.cool_max)),
                Colour::Cyan,
            ),
            TemperatureState::Average => (
                format!("{}-{}°F", bound(config.cool_max), bound(config.average_max)),
                Colour::Green,
            ),
            TemperatureState::Warm => (
                format!("{}-{}°F", bound(config.average_max), bound(config.warm_max)),
                Colour::Yellow,
            ),
            TemperatureState::Hot => (format!("above {}°F", bound(config.warm_max)), Colour::Red),
        };

        Some(AlertPayload::new(
            format!("Temperature is {}", state),
            format!("Current temperature: {:.1}°F ({})", calibrated, range),
            colour,
        ))
    }

    pub fn current_state(&self) -> Option<TemperatureState> {
        self.current
    }

    pub fn previous_state(&self) -> Option<TemperatureState> {
        self.previous
    }

    pub fn state_name(&self) -> &'static str {
        self.current.map_or("UNKNOWN", |state| state.name())
    }
}

/// Band limits keep their configured precision, with at least one decimal.
fn bound(limit: f64) -> String {
    format!("{:?}", limit)
}
