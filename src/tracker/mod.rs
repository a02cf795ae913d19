//! Stateful trackers fed by the monitor once per poll cycle.
//!
//! Both trackers take the current [`TemperatureConfig`](crate::config::TemperatureConfig)
//! by reference on every call, so a configuration refresh between cycles is
//! always seen as a whole.

pub mod classifier;
pub mod sensor;
pub mod temperature;

pub use classifier::classify;
pub use sensor::SensorStateTracker;
pub use temperature::TemperatureTracker;
