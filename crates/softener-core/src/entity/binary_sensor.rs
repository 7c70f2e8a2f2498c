// # Binary Sensors

use super::{Entity, EntityCategory, EntityDescription, Platform, StateValue};
use crate::model::Device;

/// Description of a binary sensor entity
#[derive(Debug)]
pub struct BinarySensorDescription {
    pub key: &'static str,
    pub category: Option<EntityCategory>,
    pub device_class: Option<&'static str>,
    pub enabled_by_default: bool,
    pub exists_fn: fn(&Device) -> bool,
    pub value_fn: fn(&Device) -> Option<bool>,
    /// Extra attributes shown next to the state
    pub extra_attr_fn: fn(&Device) -> Option<serde_json::Value>,
}

impl EntityDescription for BinarySensorDescription {
    const PLATFORM: Platform = Platform::BinarySensor;

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
        (self.value_fn)(device).map(StateValue::Bool)
    }
}

impl Entity<BinarySensorDescription> {
    pub fn is_on(&self) -> Option<bool> {
        let device = self.snapshot()?;
        (self.description().value_fn)(&device)
    }

    pub fn extra_attributes(&self) -> Option<serde_json::Value> {
        let device = self.snapshot()?;
        (self.description().extra_attr_fn)(&device)
    }
}

pub static BINARY_SENSORS: &[BinarySensorDescription] = &[BinarySensorDescription {
    key: "has_error",
    category: None,
    device_class: Some("problem"),
    enabled_by_default: true,
    exists_fn: |_| true,
    value_fn: |d| Some(d.has_error()),
    extra_attr_fn: |d| {
        Some(serde_json::json!({
            "errors": serde_json::to_value(&d.errors).unwrap_or_default()
        }))
    },
}];
