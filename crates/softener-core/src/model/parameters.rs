// # Device Parameters
//
// User-configurable settings of a softener and the mapping type used to
// request changes to them. Parameter names on the wire are the field names
// of `DeviceParameters`.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Settings sub-record of a [`Device`](super::Device)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceParameters {
    // Option codes (see the select tables in `entity::select`)
    pub regeneration_mode: Option<u8>,
    pub water_hardness_unit: Option<u8>,
    pub language: Option<u8>,
    pub mode: Option<u8>,
    pub led_ring_mode: Option<u8>,
    pub mode_individual_monday: Option<u8>,
    pub mode_individual_tuesday: Option<u8>,
    pub mode_individual_wednesday: Option<u8>,
    pub mode_individual_thursday: Option<u8>,
    pub mode_individual_friday: Option<u8>,
    pub mode_individual_saturday: Option<u8>,
    pub mode_individual_sunday: Option<u8>,

    // Water settings
    pub raw_water_hardness: Option<f64>,
    pub soft_water_hardness: Option<f64>,

    // Maintenance and display
    pub maintenance_interval: Option<f64>,
    pub led_ring_brightness: Option<f64>,
    pub residual_capacity_limit: Option<f64>,
    pub current_setpoint: Option<f64>,
    pub charge: Option<f64>,
    pub interval_forced_regeneration: Option<f64>,

    // Valves and meters
    pub end_frequency_regeneration_valve: Option<f64>,
    pub end_frequency_regeneration_valve_2: Option<f64>,
    pub end_frequency_blending_valve: Option<f64>,
    pub treatment_volume: Option<f64>,
    pub soft_water_meter_pulse_rate: Option<f64>,
    pub blending_water_meter_pulse_rate: Option<f64>,
    pub regeneration_water_meter_pulse_rate: Option<f64>,

    // Capacity figure per weekday [m³x°dH]
    pub capacity_figure_monday: Option<f64>,
    pub capacity_figure_tuesday: Option<f64>,
    pub capacity_figure_wednesday: Option<f64>,
    pub capacity_figure_thursday: Option<f64>,
    pub capacity_figure_friday: Option<f64>,
    pub capacity_figure_saturday: Option<f64>,
    pub capacity_figure_sunday: Option<f64>,

    // Regeneration cycle
    pub nominal_flow_rate: Option<f64>,
    pub regeneration_monitoring_time: Option<f64>,
    pub salting_monitoring_time: Option<f64>,
    pub slow_rinse: Option<f64>,
    pub backwash: Option<f64>,
    pub washing_out: Option<f64>,
    pub minimum_filling_volume_smallest_cap: Option<f64>,
    pub maximum_filling_volume_smallest_cap: Option<f64>,
    pub minimum_filling_volume_largest_cap: Option<f64>,
    pub maximum_filling_volume_largest_cap: Option<f64>,
    pub longest_switch_on_time_chlorine_cell: Option<f64>,
    pub maximum_remaining_time_regeneration: Option<f64>,

    // Switches
    pub dlst: Option<bool>,
    pub buzzer: Option<bool>,
    pub push_notification: Option<bool>,
    pub email_notification: Option<bool>,
    pub led_ring_flash_on_signal: Option<bool>,
    pub ntp_sync: Option<bool>,
    pub fault_signal_contact: Option<bool>,
    pub knx: Option<bool>,
    pub nominal_flow_monitoring: Option<bool>,
    pub disinfection_monitoring: Option<bool>,

    // Installer information
    pub installer_name: Option<String>,
    pub installer_phone: Option<String>,
    pub installer_email: Option<String>,

    // Regeneration start times, three slots per weekday
    pub regeneration_time_monday_1: Option<NaiveTime>,
    pub regeneration_time_monday_2: Option<NaiveTime>,
    pub regeneration_time_monday_3: Option<NaiveTime>,
    pub regeneration_time_tuesday_1: Option<NaiveTime>,
    pub regeneration_time_tuesday_2: Option<NaiveTime>,
    pub regeneration_time_tuesday_3: Option<NaiveTime>,
    pub regeneration_time_wednesday_1: Option<NaiveTime>,
    pub regeneration_time_wednesday_2: Option<NaiveTime>,
    pub regeneration_time_wednesday_3: Option<NaiveTime>,
    pub regeneration_time_thursday_1: Option<NaiveTime>,
    pub regeneration_time_thursday_2: Option<NaiveTime>,
    pub regeneration_time_thursday_3: Option<NaiveTime>,
    pub regeneration_time_friday_1: Option<NaiveTime>,
    pub regeneration_time_friday_2: Option<NaiveTime>,
    pub regeneration_time_friday_3: Option<NaiveTime>,
    pub regeneration_time_saturday_1: Option<NaiveTime>,
    pub regeneration_time_saturday_2: Option<NaiveTime>,
    pub regeneration_time_saturday_3: Option<NaiveTime>,
    pub regeneration_time_sunday_1: Option<NaiveTime>,
    pub regeneration_time_sunday_2: Option<NaiveTime>,
    pub regeneration_time_sunday_3: Option<NaiveTime>,
}

impl DeviceParameters {
    /// Return a copy with `update` applied
    ///
    /// Every key must name an existing parameter and every value must have a
    /// type compatible with it. On failure the original is left untouched and
    /// the reason is returned.
    pub fn with_update(&self, update: &ParameterUpdate) -> Result<Self, String> {
        let mut value = serde_json::to_value(self).map_err(|e| e.to_string())?;
        let map = value
            .as_object_mut()
            .ok_or_else(|| "parameters are not an object".to_string())?;

        for (key, new_value) in update.iter() {
            if !map.contains_key(key) {
                return Err(format!("unknown parameter '{}'", key));
            }
            let new_value = serde_json::to_value(new_value).map_err(|e| e.to_string())?;
            map.insert(key.clone(), new_value);
        }

        serde_json::from_value(value).map_err(|e| format!("invalid parameter value: {}", e))
    }
}

/// A single requested parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Time(NaiveTime),
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Time(v) => write!(f, "{}", v.format("%H:%M")),
            ParameterValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for ParameterValue {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<NaiveTime> for ParameterValue {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Mapping of parameter names to requested values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterUpdate(BTreeMap<String, ParameterValue>);

impl ParameterUpdate {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an update for one parameter
    pub fn single(key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self::new().with(key, value)
    }

    /// Add a parameter (builder style)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParameterValue>> FromIterator<(K, V)> for ParameterUpdate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut update = Self::new();
        for (key, value) in iter {
            update.insert(key, value);
        }
        update
    }
}
