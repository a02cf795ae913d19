use crate::config::TemperatureConfig;
use crate::models::TemperatureState;

/// Band for an already calibrated temperature. A value equal to a boundary
/// belongs to the lower band; anything above `warm_max` is hot.
pub fn classify(temperature: f64, config: &TemperatureConfig) -> TemperatureState {
    let bands = [
        (config.cold_max, TemperatureState::Cold),
        (config.cool_max, TemperatureState::Cool),
        (config.average_max, TemperatureState::Average),
        (config.warm_max, TemperatureState::Warm),
    ];

    bands
        .into_iter()
        .find(|(upper, _)| temperature <= *upper)
        .map_or(TemperatureState::Hot, |(_, state)| state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_belong_to_lower_band() {
        let config = TemperatureConfig::default();
        assert_eq!(classify(config.cold_max, &config), TemperatureState::Cold);
        assert_eq!(classify(config.cool_max, &config), TemperatureState::Cool);
        assert_eq!(classify(config.average_max, &config), TemperatureState::Average);
        assert_eq!(classify(config.warm_max, &config), TemperatureState::Warm);
    }

    #[test]
    fn test_just_above_boundary() {
        let config = TemperatureConfig::default();
        let eps = 1e-6;
        assert_eq!(classify(config.cold_max + eps, &config), TemperatureState::Cool);
        assert_eq!(classify(config.cool_max + eps, &config), TemperatureState::Average);
        assert_eq!(classify(config.average_max + eps, &config), TemperatureState::Warm);
        assert_eq!(classify(config.warm_max + eps, &config), TemperatureState::Hot);
    }

    #[test]
    fn test_extremes() {
        let config = TemperatureConfig::default();
        assert_eq!(classify(-40.0, &config), TemperatureState::Cold);
        assert_eq!(classify(110.0, &config), TemperatureState::Hot);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let config = TemperatureConfig::default();
        let mut previous = classify(90.0, &config);
        let mut t = 90.0;
        while t < 105.0 {
            let state = classify(t, &config);
            assert!(state >= previous, "{} classified below a cooler value", t);
            previous = state;
            t += 0.05;
        }
        assert_eq!(previous, TemperatureState::Hot);
    }
}
