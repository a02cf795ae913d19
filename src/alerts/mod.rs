//! Alert payloads sent to the webhook on state transitions.

pub mod colours;

use crate::models::SensorState;
pub use colours::Colour;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub title: String,
    pub description: String,
    pub colour: u32,
}

impl AlertPayload {
    pub fn new(title: impl Into<String>, description: impl Into<String>, colour: Colour) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            colour: colour.rgb(),
        }
    }

    /// Alert for a sensor connectivity change. `Unknown` never alerts.
    pub fn sensor_state(state: SensorState) -> Option<Self> {
        let (description, colour) = match state {
            SensorState::Unknown => return None,
            SensorState::Connected => (
                "Temperature sensor is now properly connected and monitoring body temperature.",
                Colour::Green,
            ),
            SensorState::Disconnected => (
                "Temperature sensor has been disconnected or removed from body.",
                Colour::Orange,
            ),
            SensorState::Mispositioned => (
                "Temperature sensor appears to be mispositioned. Please check placement.",
                Colour::Yellow,
            ),
        };
        Some(Self::new(format!("Sensor {}", state), description, colour))
    }

    pub fn source_online(source_name: &str, online: bool) -> Self {
        if online {
            Self::new(
                format!("{} is ONLINE", source_name),
                "The monitoring system is now sending data.",
                Colour::Green,
            )
        } else {
            Self::new(
                format!("{} is OFFLINE", source_name),
                "No data received in the last few minutes!",
                Colour::Red,
            )
        }
    }

    pub fn monitor_error(error: &str) -> Self {
        Self::new(
            "Monitor Error",
            format!("The temperature monitoring service encountered an error: {}", error),
            Colour::Red,
        )
    }
}
