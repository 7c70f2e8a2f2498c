// # Switches

use super::{Entity, EntityCategory, EntityDescription, Platform, StateValue, params};
use crate::error::Result;
use crate::model::{Device, DeviceParameters, ParameterUpdate};

/// Description of a switch entity
#[derive(Debug)]
pub struct SwitchDescription {
    pub key: &'static str,
    pub category: Option<EntityCategory>,
    pub enabled_by_default: bool,
    pub exists_fn: fn(&Device) -> bool,
    pub value_fn: fn(&DeviceParameters) -> Option<bool>,
    pub update_fn: Option<fn(bool) -> ParameterUpdate>,
}

impl EntityDescription for SwitchDescription {
    const PLATFORM: Platform = Platform::Switch;

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
        (self.value_fn)(params(device)?).map(StateValue::Bool)
    }
}

impl Entity<SwitchDescription> {
    pub fn is_on(&self) -> Option<bool> {
        let device = self.snapshot()?;
        (self.description().value_fn)(params(&device)?)
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.set_value(true).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.set_value(false).await
    }

    pub async fn set_value(&self, value: bool) -> Result<()> {
        self.write(self.description().update_fn.map(|update| update(value)))
            .await
    }
}

macro_rules! switch {
    ($field:ident, enabled: $enabled:literal) => {
        SwitchDescription {
            key: stringify!($field),
            category: Some(EntityCategory::Config),
            enabled_by_default: $enabled,
            exists_fn: |_| true,
            value_fn: |p| p.$field,
            update_fn: Some(|value| ParameterUpdate::single(stringify!($field), value)),
        }
    };
}

pub static SWITCHES: &[SwitchDescription] = &[
    // Daylight saving time
    switch!(dlst, enabled: true),
    // Audio signal on error
    switch!(buzzer, enabled: true),
    switch!(push_notification, enabled: true),
    switch!(email_notification, enabled: true),
    // LED ring flashes on salt pre-alarm
    switch!(led_ring_flash_on_signal, enabled: false),
    switch!(ntp_sync, enabled: false),
    switch!(fault_signal_contact, enabled: false),
    switch!(knx, enabled: false),
    switch!(nominal_flow_monitoring, enabled: false),
    switch!(disinfection_monitoring, enabled: false),
];
