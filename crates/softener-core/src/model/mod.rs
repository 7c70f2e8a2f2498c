//! Device state snapshot model
//!
//! A [`Device`] is the full point-in-time state of one softener as reported by
//! the cloud service. Snapshots are never patched field by field: every pull,
//! push or confirmed write produces a new one that replaces the old one.

mod parameters;

pub use parameters::{DeviceParameters, ParameterUpdate, ParameterValue};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Full state of one remote device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Cloud identifier, used to bind the client
    pub id: String,

    /// Display name chosen by the owner
    pub name: String,

    /// Serial number, also the base of entity unique ids
    pub serial_number: String,

    /// Product series (model)
    pub series: Option<String>,

    /// Hardware version string
    pub hardware_version: Option<String>,

    /// Firmware version string
    pub software_version: Option<String>,

    /// User-configurable settings
    pub parameters: Option<DeviceParameters>,

    /// Live measurement values
    pub realtime: Option<Realtime>,

    /// Currently reported faults
    pub errors: Vec<DeviceFault>,

    /// Daily salt usage in kg, chronological
    pub salt: Option<Vec<DailyUsage>>,

    /// Daily water usage in litres, chronological
    pub water: Option<Vec<DailyUsage>>,
}

impl Device {
    /// Whether any unresolved fault is reported
    pub fn has_error(&self) -> bool {
        self.errors.iter().any(|fault| !fault.resolved)
    }
}

/// Live values reported by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Realtime {
    pub next_regeneration: Option<DateTime<Utc>>,
    pub startup: Option<NaiveDate>,
    pub last_service: Option<NaiveDate>,
    /// Raw water hardness [°dH]
    pub raw_water: Option<f64>,
    /// Soft water hardness [°dH]
    pub soft_water: Option<f64>,
    /// Soft water produced since startup [l]
    pub soft_water_quantity: Option<f64>,
    pub regeneration_counter: Option<u32>,
    /// Current flow [m³/h]
    pub current_flow_rate: Option<f64>,
    /// Remaining capacity [m³]
    pub remaining_capacity_volume: Option<f64>,
    /// Remaining capacity [%]
    pub remaining_capacity_percentage: Option<f64>,
    /// Salt reach [days]
    pub salt_range: Option<u32>,
    /// Salt consumed [kg]
    pub salt_consumption: Option<f64>,
    /// Days until the next service
    pub next_service: Option<u32>,
}

/// One fault entry as reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFault {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved: bool,
}

/// One day of a historical usage series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub value: f64,
}

impl DailyUsage {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Short description of a device returned by account discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    pub serial_number: String,
}

impl From<&Device> for DeviceSummary {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            serial_number: device.serial_number.clone(),
        }
    }
}
