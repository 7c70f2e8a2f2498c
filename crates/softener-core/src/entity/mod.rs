//! Presentation entities
//!
//! Entities are thin, read-mostly views over the coordinator snapshot. Each
//! platform (sensor, switch, ...) has a static table of descriptions; an
//! [`Entity`] binds one description to a [`Coordinator`] handle.
//!
//! A description holds plain function pointers:
//! - `exists_fn`: whether the entity applies to this device at all
//! - `value_fn`: reads the state out of a snapshot
//! - `update_fn`: builds the parameter mapping for a write, if writable
//!
//! Writes always go through [`Coordinator::request_parameter_update`]; the
//! entity never patches the snapshot itself.

pub mod binary_sensor;
pub mod number;
pub mod select;
pub mod sensor;
pub mod switch;
pub mod text;
pub mod time;

pub use binary_sensor::BinarySensorDescription;
pub use number::{NumberDescription, NumberMode};
pub use select::SelectDescription;
pub use sensor::SensorDescription;
pub use switch::SwitchDescription;
pub use text::TextDescription;
pub use time::TimeDescription;

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::model::{Device, DeviceParameters, ParameterUpdate};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Manufacturer reported in [`DeviceInfo`]
pub const MANUFACTURER: &str = "Grünbeck";

/// Platform an entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Sensor,
    BinarySensor,
    Select,
    Number,
    Switch,
    Text,
    Time,
}

/// Where the host shows an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

/// State of an entity, rendered by the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Time(NaiveTime),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Bool(true) => f.write_str("on"),
            StateValue::Bool(false) => f.write_str("off"),
            StateValue::Integer(v) => write!(f, "{}", v),
            StateValue::Number(v) => write!(f, "{}", v),
            StateValue::Text(v) => f.write_str(v),
            StateValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            StateValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            StateValue::Time(v) => write!(f, "{}", v.format("%H:%M")),
        }
    }
}

/// Common view of a static entity description
pub trait EntityDescription: Send + Sync + 'static {
    /// Platform of every description of this type
    const PLATFORM: Platform;

    fn key(&self) -> &'static str;

    fn category(&self) -> Option<EntityCategory>;

    fn enabled_by_default(&self) -> bool;

    /// Whether the entity applies to `device`
    fn exists(&self, device: &Device) -> bool;

    /// Read the entity state from `device`
    fn state(&self, device: &Device) -> Option<StateValue>;
}

/// Device registry information shared by every entity of one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub serial_number: String,
    pub model: Option<String>,
    pub hw_version: Option<String>,
    pub sw_version: Option<String>,
}

impl From<&Device> for DeviceInfo {
    fn from(device: &Device) -> Self {
        Self {
            identifier: device.id.clone(),
            name: device.id.clone(),
            manufacturer: MANUFACTURER,
            serial_number: device.serial_number.clone(),
            model: device.series.clone(),
            hw_version: device.hardware_version.clone(),
            sw_version: device.software_version.clone(),
        }
    }
}

/// One entity: a description bound to a coordinator
pub struct Entity<D: 'static> {
    coordinator: Coordinator,
    description: &'static D,
    unique_id: String,
}

impl<D: EntityDescription> Entity<D> {
    pub fn new(coordinator: Coordinator, description: &'static D, serial_number: &str) -> Self {
        Self {
            unique_id: format!("{}_{}", serial_number, description.key()),
            coordinator,
            description,
        }
    }

    /// Stable id: `{serial_number}_{key}`
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn key(&self) -> &'static str {
        self.description.key()
    }

    pub fn platform(&self) -> Platform {
        D::PLATFORM
    }

    pub fn description(&self) -> &'static D {
        self.description
    }

    /// Mirrors the coordinator's last-update success flag
    pub fn available(&self) -> bool {
        self.coordinator.last_update_success()
    }

    /// Current state, `None` when unknown
    pub fn state(&self) -> Option<StateValue> {
        let device = self.coordinator.current_snapshot()?;
        self.description.state(&device)
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.coordinator
            .current_snapshot()
            .map(|device| DeviceInfo::from(device.as_ref()))
    }

    pub(crate) fn snapshot(&self) -> Option<std::sync::Arc<Device>> {
        self.coordinator.current_snapshot()
    }

    /// Send a write built by a description's `update_fn`
    ///
    /// `None` means the entity cannot be written: a warning is logged and no
    /// call is made.
    async fn write(&self, update: Option<ParameterUpdate>) -> Result<()> {
        let Some(update) = update else {
            warn!(
                entity = %self.unique_id,
                "entity can currently not be updated through the integration"
            );
            return Ok(());
        };
        self.coordinator.request_parameter_update(update).await
    }
}

/// Settings sub-record of a snapshot, if present
pub(crate) fn params(device: &Device) -> Option<&DeviceParameters> {
    device.parameters.as_ref()
}

/// Every entity of one device, grouped by platform
pub struct EntitySet {
    pub sensors: Vec<Entity<SensorDescription>>,
    pub binary_sensors: Vec<Entity<BinarySensorDescription>>,
    pub selects: Vec<Entity<SelectDescription>>,
    pub numbers: Vec<Entity<NumberDescription>>,
    pub switches: Vec<Entity<SwitchDescription>>,
    pub texts: Vec<Entity<TextDescription>>,
    pub times: Vec<Entity<TimeDescription>>,
}

impl EntitySet {
    /// Build all entities that exist for the coordinator's current snapshot
    ///
    /// Returns `None` before the first successful refresh.
    pub fn from_coordinator(coordinator: &Coordinator) -> Option<Self> {
        let device = coordinator.current_snapshot()?;

        Some(Self {
            sensors: build(coordinator, &device, sensor::SENSORS),
            binary_sensors: build(coordinator, &device, binary_sensor::BINARY_SENSORS),
            selects: build(coordinator, &device, select::SELECTS),
            numbers: build(coordinator, &device, number::NUMBERS),
            switches: build(coordinator, &device, switch::SWITCHES),
            texts: build(coordinator, &device, text::TEXTS),
            times: build(coordinator, &device, time::TIMES),
        })
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
            + self.binary_sensors.len()
            + self.selects.len()
            + self.numbers.len()
            + self.switches.len()
            + self.texts.len()
            + self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(unique_id, state)` of every entity, for logging and diagnostics
    pub fn states(&self) -> Vec<(String, Option<StateValue>)> {
        fn collect<D: EntityDescription>(
            out: &mut Vec<(String, Option<StateValue>)>,
            entities: &[Entity<D>],
        ) {
            out.extend(
                entities
                    .iter()
                    .map(|entity| (entity.unique_id().to_string(), entity.state())),
            );
        }

        let mut out = Vec::with_capacity(self.len());
        collect(&mut out, &self.sensors);
        collect(&mut out, &self.binary_sensors);
        collect(&mut out, &self.selects);
        collect(&mut out, &self.numbers);
        collect(&mut out, &self.switches);
        collect(&mut out, &self.texts);
        collect(&mut out, &self.times);
        out
    }
}

fn build<D: EntityDescription>(
    coordinator: &Coordinator,
    device: &Device,
    table: &'static [D],
) -> Vec<Entity<D>> {
    table
        .iter()
        .filter(|description| description.exists(device))
        .map(|description| Entity::new(coordinator.clone(), description, &device.serial_number))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_values_render_for_humans() {
        assert_eq!(StateValue::Bool(true).to_string(), "on");
        assert_eq!(StateValue::Number(18.5).to_string(), "18.5");
        assert_eq!(
            StateValue::Time(NaiveTime::from_hms_opt(2, 30, 0).unwrap()).to_string(),
            "02:30"
        );
        assert_eq!(
            StateValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).to_string(),
            "2024-03-01"
        );
    }

    #[test]
    fn tables_have_unique_keys() {
        let mut keys: Vec<&str> = Vec::new();
        keys.extend(sensor::SENSORS.iter().map(|d| d.key));
        keys.extend(binary_sensor::BINARY_SENSORS.iter().map(|d| d.key));
        keys.extend(select::SELECTS.iter().map(|d| d.key));
        keys.extend(number::NUMBERS.iter().map(|d| d.key));
        keys.extend(switch::SWITCHES.iter().map(|d| d.key));
        keys.extend(text::TEXTS.iter().map(|d| d.key));
        keys.extend(time::TIMES.iter().map(|d| d.key));

        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total, "entity keys must be unique");
    }

    #[test]
    fn table_sizes() {
        assert_eq!(sensor::SENSORS.len(), 13);
        assert_eq!(binary_sensor::BINARY_SENSORS.len(), 1);
        assert_eq!(select::SELECTS.len(), 11);
        assert_eq!(number::NUMBERS.len(), 34);
        assert_eq!(switch::SWITCHES.len(), 10);
        assert_eq!(text::TEXTS.len(), 3);
        assert_eq!(time::TIMES.len(), 21);
    }

    #[test]
    fn device_info_uses_id_as_name() {
        let device = Device {
            id: "softliQ.D/BS12345".to_string(),
            serial_number: "BS12345".to_string(),
            series: Some("softliQ:SD21".to_string()),
            ..Default::default()
        };
        let info = DeviceInfo::from(&device);
        assert_eq!(info.name, "softliQ.D/BS12345");
        assert_eq!(info.manufacturer, MANUFACTURER);
        assert_eq!(info.model.as_deref(), Some("softliQ:SD21"));
    }
}
