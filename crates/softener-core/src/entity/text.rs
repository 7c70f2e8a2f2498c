// # Texts
//
// Installer contact details.

use super::{Entity, EntityCategory, EntityDescription, Platform, StateValue, params};
use crate::error::{Error, Result};
use crate::model::{Device, DeviceParameters, ParameterUpdate};

/// Description of a text entity
#[derive(Debug)]
pub struct TextDescription {
    pub key: &'static str,
    pub category: Option<EntityCategory>,
    pub enabled_by_default: bool,
    pub max_length: usize,
    pub exists_fn: fn(&Device) -> bool,
    pub value_fn: fn(&DeviceParameters) -> Option<&str>,
    pub update_fn: Option<fn(String) -> ParameterUpdate>,
}

impl EntityDescription for TextDescription {
    const PLATFORM: Platform = Platform::Text;

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
        (self.value_fn)(params(device)?).map(|v| StateValue::Text(v.to_string()))
    }
}

impl Entity<TextDescription> {
    pub fn value(&self) -> Option<String> {
        let device = self.snapshot()?;
        (self.description().value_fn)(params(&device)?).map(str::to_string)
    }

    pub async fn set_value(&self, value: impl Into<String>) -> Result<()> {
        let description = self.description();
        let value = value.into();
        if value.chars().count() > description.max_length {
            return Err(Error::invalid_input(format!(
                "{} is limited to {} characters",
                description.key, description.max_length
            )));
        }
        self.write(description.update_fn.map(|update| update(value)))
            .await
    }
}

macro_rules! text {
    ($field:ident) => {
        TextDescription {
            key: stringify!($field),
            category: Some(EntityCategory::Config),
            enabled_by_default: false,
            max_length: 255,
            exists_fn: |_| true,
            value_fn: |p| p.$field.as_deref(),
            update_fn: Some(|value| ParameterUpdate::single(stringify!($field), value)),
        }
    };
}

pub static TEXTS: &[TextDescription] = &[
    text!(installer_name),
    text!(installer_phone),
    text!(installer_email),
];
