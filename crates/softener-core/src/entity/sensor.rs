// # Sensors
//
// Read-only live values from the realtime sub-record.

use super::{EntityCategory, EntityDescription, Platform, StateValue};
use crate::model::{Device, Realtime};

pub const UNIT_DH: &str = "°dH";
pub const UNIT_DAYS: &str = "d";

/// Description of a sensor entity
#[derive(Debug)]
pub struct SensorDescription {
    pub key: &'static str,
    pub category: Option<EntityCategory>,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub enabled_by_default: bool,
    pub exists_fn: fn(&Device) -> bool,
    pub value_fn: fn(&Device) -> Option<StateValue>,
}

impl EntityDescription for SensorDescription {
    const PLATFORM: Platform = Platform::Sensor;

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
        (self.value_fn)(device)
    }
}

fn realtime(device: &Device) -> Option<&Realtime> {
    device.realtime.as_ref()
}

fn always(_: &Device) -> bool {
    true
}

fn number(value: Option<f64>) -> Option<StateValue> {
    value.map(StateValue::Number)
}

fn integer(value: Option<u32>) -> Option<StateValue> {
    value.map(|v| StateValue::Integer(i64::from(v)))
}

pub static SENSORS: &[SensorDescription] = &[
    SensorDescription {
        key: "next_regeneration",
        category: Some(EntityCategory::Diagnostic),
        unit: None,
        device_class: Some("timestamp"),
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| realtime(d)?.next_regeneration.map(StateValue::Timestamp),
    },
    SensorDescription {
        key: "startup",
        category: Some(EntityCategory::Diagnostic),
        unit: None,
        device_class: Some("date"),
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| realtime(d)?.startup.map(StateValue::Date),
    },
    SensorDescription {
        key: "last_service",
        category: Some(EntityCategory::Diagnostic),
        unit: None,
        device_class: Some("date"),
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| realtime(d)?.last_service.map(StateValue::Date),
    },
    SensorDescription {
        key: "raw_water",
        category: Some(EntityCategory::Diagnostic),
        unit: Some(UNIT_DH),
        device_class: None,
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| number(realtime(d)?.raw_water),
    },
    SensorDescription {
        key: "soft_water",
        category: Some(EntityCategory::Diagnostic),
        unit: Some(UNIT_DH),
        device_class: None,
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| number(realtime(d)?.soft_water),
    },
    SensorDescription {
        key: "soft_water_quantity",
        category: None,
        unit: Some("L"),
        device_class: Some("water"),
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| number(realtime(d)?.soft_water_quantity),
    },
    SensorDescription {
        key: "regeneration_counter",
        category: Some(EntityCategory::Diagnostic),
        unit: None,
        device_class: None,
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| integer(realtime(d)?.regeneration_counter),
    },
    SensorDescription {
        key: "current_flow_rate",
        category: None,
        unit: Some("m³/h"),
        device_class: Some("volume_flow_rate"),
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| number(realtime(d)?.current_flow_rate),
    },
    SensorDescription {
        key: "remaining_capacity_volume",
        category: None,
        unit: Some("m³"),
        device_class: Some("volume"),
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| number(realtime(d)?.remaining_capacity_volume),
    },
    SensorDescription {
        key: "remaining_capacity_percentage",
        category: None,
        unit: Some("%"),
        device_class: None,
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| number(realtime(d)?.remaining_capacity_percentage),
    },
    SensorDescription {
        key: "salt_range",
        category: None,
        unit: Some(UNIT_DAYS),
        device_class: None,
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| integer(realtime(d)?.salt_range),
    },
    SensorDescription {
        key: "salt_consumption",
        category: None,
        unit: Some("kg"),
        device_class: Some("weight"),
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| number(realtime(d)?.salt_consumption),
    },
    SensorDescription {
        key: "next_service",
        category: Some(EntityCategory::Diagnostic),
        unit: Some(UNIT_DAYS),
        device_class: None,
        enabled_by_default: true,
        exists_fn: always,
        value_fn: |d| integer(realtime(d)?.next_service),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(key: &str) -> &'static SensorDescription {
        SENSORS.iter().find(|d| d.key == key).unwrap()
    }

    #[test]
    fn reads_realtime_values() {
        let device = Device {
            realtime: Some(Realtime {
                raw_water: Some(21.0),
                salt_range: Some(42),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(
            sensor("raw_water").state(&device),
            Some(StateValue::Number(21.0))
        );
        assert_eq!(
            sensor("salt_range").state(&device),
            Some(StateValue::Integer(42))
        );
        assert_eq!(sensor("soft_water").state(&device), None);
    }

    #[test]
    fn missing_realtime_means_unknown() {
        let device = Device::default();
        assert!(SENSORS.iter().all(|d| d.state(&device).is_none()));
    }
}
