pub mod reading;
pub mod state;

pub use reading::Reading;
pub use state::{SensorState, TemperatureState};

/// Primary and reference readings pulled for one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct SensorWindows {
    pub primary: Vec<Reading>,
    pub reference: Vec<Reading>,
}

impl SensorWindows {
    pub fn latest_primary(&self) -> Option<&Reading> {
        self.primary.last()
    }
}
