use std::fmt;

/// Connectivity of the body sensor as inferred from its readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorState {
    #[default]
    Unknown,
    Disconnected,
    Connected,
    Mispositioned,
}

impl SensorState {
    pub fn name(&self) -> &'static str {
        match self {
            SensorState::Unknown => "UNKNOWN",
            SensorState::Disconnected => "DISCONNECTED",
            SensorState::Connected => "CONNECTED",
            SensorState::Mispositioned => "MISPOSITIONED",
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Temperature bands, declared in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemperatureState {
    Cold,
    Cool,
    Average,
    Warm,
    Hot,
}

impl TemperatureState {
    pub fn name(&self) -> &'static str {
        match self {
            TemperatureState::Cold => "COLD",
            TemperatureState::Cool => "COOL",
            TemperatureState::Average => "AVERAGE",
            TemperatureState::Warm => "WARM",
            TemperatureState::Hot => "HOT",
        }
    }
}

impl fmt::Display for TemperatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
