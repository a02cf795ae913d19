//! Runtime overrides pulled from dashboard variables.
//!
//! Variables are matched to configuration fields by name: `temp_<field>` (or
//! the bare field name) for [`TemperatureConfig`], and `check_interval` /
//! `offline_threshold` for [`GeneralConfig`]. Each value is coerced to the
//! type the field already has; values that do not convert are logged and the
//! previous setting is kept.

use indexmap::IndexMap;
use log::{info, warn};
use serde_json::Value;
use thiserror::Error;

use super::{GeneralConfig, TemperatureConfig};

/// Dashboard variable name to raw value, in dashboard order.
pub type RemoteVariables = IndexMap<String, Value>;

const TEMPERATURE_PREFIX: &str = "temp_";

const FLOAT_FIELDS: [&str; 8] = [
    "cold_max",
    "cool_max",
    "average_max",
    "warm_max",
    "calibration_offset",
    "min_realistic_temp",
    "stabilization_threshold",
    "room_temp_threshold",
];

const WHOLE_FIELDS: [&str; 2] = ["misposition_time_threshold", "min_stabilization_time"];

const GENERAL_FIELDS: [&str; 2] = ["check_interval", "offline_threshold"];

#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
    #[error("{field}: cannot convert {value} to a number")]
    NotNumeric { field: String, value: String },

    #[error("{field}: {value} is not a non-negative whole number")]
    OutOfRange { field: String, value: f64 },
}

/// A configuration snapshot with remote overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOverride {
    pub temperature: TemperatureConfig,
    pub general: GeneralConfig,
    /// Names of the fields whose value actually changed.
    pub changed: Vec<&'static str>,
}

impl RemoteOverride {
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Build new configuration values from `temperature` and `general` with the
/// matching `variables` applied. The inputs are left untouched.
pub fn apply_remote_variables(
    temperature: &TemperatureConfig,
    general: &GeneralConfig,
    variables: &RemoteVariables,
) -> RemoteOverride {
    let mut temperature = temperature.clone();
    let mut general = general.clone();
    let mut changed = Vec::new();

    for field in FLOAT_FIELDS {
        let Some(raw) = lookup_temperature(variables, field) else {
            continue;
        };
        let Some(slot) = float_field_mut(&mut temperature, field) else {
            continue;
        };
        match coerce_float(field, raw) {
            Ok(value) if value != *slot => {
                info!("Updated {} from {} to {}", field, slot, value);
                *slot = value;
                changed.push(field);
            }
            Ok(_) => {}
            Err(e) => warn!("Ignoring remote value: {}", e),
        }
    }

    for field in WHOLE_FIELDS {
        let Some(raw) = lookup_temperature(variables, field) else {
            continue;
        };
        let Some(slot) = whole_field_mut(&mut temperature, field) else {
            continue;
        };
        apply_whole(field, raw, slot, &mut changed);
    }

    for field in GENERAL_FIELDS {
        let Some(raw) = variables.get(field) else {
            continue;
        };
        let slot = match field {
            "check_interval" => &mut general.check_interval,
            _ => &mut general.offline_threshold,
        };
        apply_whole(field, raw, slot, &mut changed);
    }

    RemoteOverride {
        temperature,
        general,
        changed,
    }
}

fn apply_whole(field: &'static str, raw: &Value, slot: &mut u64, changed: &mut Vec<&'static str>) {
    match coerce_whole(field, raw) {
        Ok(value) if value != *slot => {
            info!("Updated {} from {} to {}", field, slot, value);
            *slot = value;
            changed.push(field);
        }
        Ok(_) => {}
        Err(e) => warn!("Ignoring remote value: {}", e),
    }
}

fn lookup_temperature<'a>(variables: &'a RemoteVariables, field: &str) -> Option<&'a Value> {
    variables
        .get(&format!("{}{}", TEMPERATURE_PREFIX, field))
        .or_else(|| variables.get(field))
}

fn float_field_mut<'a>(config: &'a mut TemperatureConfig, field: &str) -> Option<&'a mut f64> {
    match field {
        "cold_max" => Some(&mut config.cold_max),
        "cool_max" => Some(&mut config.cool_max),
        "average_max" => Some(&mut config.average_max),
        "warm_max" => Some(&mut config.warm_max),
        "calibration_offset" => Some(&mut config.calibration_offset),
        "min_realistic_temp" => Some(&mut config.min_realistic_temp),
        "stabilization_threshold" => Some(&mut config.stabilization_threshold),
        "room_temp_threshold" => Some(&mut config.room_temp_threshold),
        _ => None,
    }
}

fn whole_field_mut<'a>(config: &'a mut TemperatureConfig, field: &str) -> Option<&'a mut u64> {
    match field {
        "misposition_time_threshold" => Some(&mut config.misposition_time_threshold),
        "min_stabilization_time" => Some(&mut config.min_stabilization_time),
        _ => None,
    }
}

/// Numbers pass through; strings are parsed after trimming.
pub fn coerce_float(field: &str, raw: &Value) -> Result<f64, CoercionError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoercionError::NotNumeric {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

/// Parsed as a float first, then truncated toward zero.
pub fn coerce_whole(field: &str, raw: &Value) -> Result<u64, CoercionError> {
    let value = coerce_float(field, raw)?;
    if value < 0.0 || value > u64::MAX as f64 {
        return Err(CoercionError::OutOfRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(value.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> RemoteVariables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(coerce_float("cold_max", &json!("96.8")), Ok(96.8));
        assert_eq!(coerce_float("cold_max", &json!(" 97 ")), Ok(97.0));
        assert_eq!(coerce_float("cold_max", &json!(95.25)), Ok(95.25));
        assert!(coerce_float("cold_max", &json!("warm")).is_err());
        assert!(coerce_float("cold_max", &json!(true)).is_err());
        assert!(coerce_float("cold_max", &json!(["1", "2"])).is_err());
    }

    #[test]
    fn test_coerce_whole_truncates() {
        assert_eq!(coerce_whole("check_interval", &json!("90")), Ok(90));
        assert_eq!(coerce_whole("check_interval", &json!("7.9")), Ok(7));
        assert_eq!(coerce_whole("check_interval", &json!(12.5)), Ok(12));
        assert!(matches!(
            coerce_whole("check_interval", &json!("-3")),
            Err(CoercionError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_apply_prefixed_and_general_fields() {
        let temperature = TemperatureConfig::default();
        let general = GeneralConfig::default();
        let variables = vars(&[
            ("temp_cold_max", json!("96.0")),
            ("temp_min_stabilization_time", json!("120.0")),
            ("check_interval", json!("30")),
            ("unrelated", json!("x")),
        ]);

        let result = apply_remote_variables(&temperature, &general, &variables);

        assert_eq!(result.temperature.cold_max, 96.0);
        assert_eq!(result.temperature.min_stabilization_time, 120);
        assert_eq!(result.general.check_interval, 30);
        assert_eq!(
            result.changed,
            vec!["cold_max", "min_stabilization_time", "check_interval"]
        );
        // inputs untouched
        assert_eq!(temperature.cold_max, 96.5);
        assert_eq!(general.check_interval, 60);
    }

    #[test]
    fn test_bare_field_names_match() {
        let variables = vars(&[("room_temp_threshold", json!(8))]);
        let result = apply_remote_variables(
            &TemperatureConfig::default(),
            &GeneralConfig::default(),
            &variables,
        );
        assert_eq!(result.temperature.room_temp_threshold, 8.0);
        assert!(result.is_changed());
    }

    #[test]
    fn test_bad_value_keeps_previous() {
        let variables = vars(&[
            ("temp_warm_max", json!("hot")),
            ("offline_threshold", json!("soon")),
            ("temp_cool_max", json!("97.1")),
        ]);
        let result = apply_remote_variables(
            &TemperatureConfig::default(),
            &GeneralConfig::default(),
            &variables,
        );
        assert_eq!(result.temperature.warm_max, 99.0);
        assert_eq!(result.general.offline_threshold, 300);
        assert_eq!(result.temperature.cool_max, 97.1);
        assert_eq!(result.changed, vec!["cool_max"]);
    }

    #[test]
    fn test_equal_values_are_not_changes() {
        let variables = vars(&[("temp_cold_max", json!("96.5")), ("check_interval", json!(60))]);
        let result = apply_remote_variables(
            &TemperatureConfig::default(),
            &GeneralConfig::default(),
            &variables,
        );
        assert!(!result.is_changed());
    }
}
