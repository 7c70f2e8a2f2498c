// # Numbers
//
// Numeric settings. Writes are range-checked before anything is sent.

use super::{Entity, EntityCategory, EntityDescription, Platform, StateValue, params};
use crate::error::{Error, Result};
use crate::model::{Device, DeviceParameters, ParameterUpdate};

/// How the host renders the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberMode {
    Box,
    Slider,
}

/// Description of a number entity
#[derive(Debug)]
pub struct NumberDescription {
    pub key: &'static str,
    pub category: Option<EntityCategory>,
    pub unit: Option<&'static str>,
    pub enabled_by_default: bool,
    pub mode: NumberMode,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub exists_fn: fn(&Device) -> bool,
    pub value_fn: fn(&DeviceParameters) -> Option<f64>,
    pub update_fn: Option<fn(f64) -> ParameterUpdate>,
}

impl NumberDescription {
    /// Check `value` against the configured bounds
    pub fn validate(&self, value: f64) -> Result<()> {
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(Error::invalid_input(format!(
                "{} must be between {} and {}, got {}",
                self.key, self.min, self.max, value
            )));
        }
        Ok(())
    }
}

impl EntityDescription for NumberDescription {
    const PLATFORM: Platform = Platform::Number;

    fn key(&self) -> &'static str {
        self.key
    }

    fn category(&self) -> Option<EntityCategory> {
        self.category
    }

    fn enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }

    fn exists(&self, device: &Device) -> bool {
        (self.exists_fn)(device)
    }

    fn state(&self, device: &Device) -> Option<StateValue> {
        (self.value_fn)(params(device)?).map(StateValue::Number)
    }
}

impl Entity<NumberDescription> {
    pub fn value(&self) -> Option<f64> {
        let device = self.snapshot()?;
        (self.description().value_fn)(params(&device)?)
    }

    /// Request a new value
    ///
    /// Out-of-range values fail with [`Error::InvalidInput`] without a call.
    pub async fn set_value(&self, value: f64) -> Result<()> {
        let description = self.description();
        description.validate(value)?;
        self.write(description.update_fn.map(|update| update(value)))
            .await
    }
}

const UNIT_DH: &str = "°dH";
const UNIT_M3_X_DH: &str = "m³x°dH";
const UNIT_L_IMP: &str = "l/Imp";

/// Number bound to the parameter field of the same name
macro_rules! number {
    (
        $field:ident,
        unit: $unit:expr,
        mode: $mode:ident,
        range: $min:literal..=$max:literal,
        step: $step:literal,
        enabled: $enabled:literal
    ) => {
        NumberDescription {
            key: stringify!($field),
            category: Some(EntityCategory::Config),
            unit: $unit,
            enabled_by_default: $enabled,
            mode: NumberMode::$mode,
            min: $min,
            max: $max,
            step: $step,
            exists_fn: |_| true,
            value_fn: |p| p.$field,
            update_fn: Some(|value| ParameterUpdate::single(stringify!($field), value)),
        }
    };
}

pub static NUMBERS: &[NumberDescription] = &[
    // Water settings
    number!(raw_water_hardness, unit: Some(UNIT_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: true),
    number!(soft_water_hardness, unit: Some(UNIT_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: true),
    // Maintenance and display
    number!(maintenance_interval, unit: Some("d"), mode: Slider, range: 1.0..=365.0, step: 1.0, enabled: false),
    number!(led_ring_brightness, unit: Some("%"), mode: Slider, range: 1.0..=100.0, step: 1.0, enabled: false),
    number!(residual_capacity_limit, unit: Some("%"), mode: Slider, range: 1.0..=100.0, step: 1.0, enabled: false),
    number!(current_setpoint, unit: Some("mA"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(charge, unit: Some("mAmin"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(interval_forced_regeneration, unit: Some("d"), mode: Slider, range: 1.0..=365.0, step: 1.0, enabled: false),
    // Valves and meters
    number!(end_frequency_regeneration_valve, unit: Some("Hz"), mode: Box, range: 0.0..=100.0, step: 1.0, enabled: false),
    number!(end_frequency_regeneration_valve_2, unit: Some("Hz"), mode: Box, range: 0.0..=100.0, step: 1.0, enabled: false),
    number!(end_frequency_blending_valve, unit: Some("Hz"), mode: Box, range: 0.0..=100.0, step: 1.0, enabled: false),
    number!(treatment_volume, unit: Some("m³"), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(soft_water_meter_pulse_rate, unit: Some(UNIT_L_IMP), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(blending_water_meter_pulse_rate, unit: Some(UNIT_L_IMP), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(regeneration_water_meter_pulse_rate, unit: Some(UNIT_L_IMP), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    // Capacity figure per weekday
    number!(capacity_figure_monday, unit: Some(UNIT_M3_X_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(capacity_figure_tuesday, unit: Some(UNIT_M3_X_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(capacity_figure_wednesday, unit: Some(UNIT_M3_X_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(capacity_figure_thursday, unit: Some(UNIT_M3_X_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(capacity_figure_friday, unit: Some(UNIT_M3_X_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(capacity_figure_saturday, unit: Some(UNIT_M3_X_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(capacity_figure_sunday, unit: Some(UNIT_M3_X_DH), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    // Regeneration cycle
    number!(nominal_flow_rate, unit: Some("m³/h"), mode: Box, range: 0.0..=100.0, step: 0.1, enabled: false),
    number!(regeneration_monitoring_time, unit: Some("min"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(salting_monitoring_time, unit: Some("min"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(slow_rinse, unit: Some("min"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(backwash, unit: Some("L"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(washing_out, unit: Some("L"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(minimum_filling_volume_smallest_cap, unit: Some("L"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(maximum_filling_volume_smallest_cap, unit: Some("L"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(minimum_filling_volume_largest_cap, unit: Some("L"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(maximum_filling_volume_largest_cap, unit: Some("L"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(longest_switch_on_time_chlorine_cell, unit: Some("min"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
    number!(maximum_remaining_time_regeneration, unit: Some("min"), mode: Box, range: 0.0..=1000.0, step: 1.0, enabled: false),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterValue;

    fn number(key: &str) -> &'static NumberDescription {
        NUMBERS.iter().find(|d| d.key == key).unwrap()
    }

    #[test]
    fn keys_match_parameter_fields() {
        let params = DeviceParameters::default();
        for description in NUMBERS {
            let update = ParameterUpdate::single(description.key, description.min);
            assert!(
                params.with_update(&update).is_ok(),
                "{} is not a parameter",
                description.key
            );
        }
    }

    #[test]
    fn range_check() {
        let description = number("maintenance_interval");
        assert!(description.validate(1.0).is_ok());
        assert!(description.validate(365.0).is_ok());
        assert!(description.validate(0.0).is_err());
        assert!(description.validate(366.0).is_err());
        assert!(description.validate(f64::NAN).is_err());
    }

    #[test]
    fn update_names_the_field() {
        let update_fn = number("raw_water_hardness").update_fn.unwrap();
        let update = update_fn(18.0);
        assert_eq!(
            update.get("raw_water_hardness"),
            Some(&ParameterValue::Float(18.0))
        );
    }

    #[test]
    fn every_number_is_writable() {
        assert!(NUMBERS.iter().all(|d| d.update_fn.is_some()));
    }
}
