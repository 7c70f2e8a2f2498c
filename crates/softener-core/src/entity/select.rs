// # Selects
//
// Enumerated settings. The device stores a numeric code, the entity shows
// a label; each description carries the code ↔ label table.

use super::{Entity, EntityCategory, EntityDescription, Platform, StateValue, params};
use crate::error::{Error, Result};
use crate::model::{Device, DeviceParameters, ParameterUpdate};

/// Code ↔ label table of one select
pub type OptionTable = &'static [(u8, &'static str)];

pub const REGENERATION_MODES: OptionTable = &[
    (0, "automatic"),
    (1, "fixed"),
    (2, "fixed_time"),
    (3, "individual"),
];

pub const WATER_HARDNESS_UNITS: OptionTable = &[
    (1, "°dH"),
    (2, "°fH"),
    (3, "°e"),
    (4, "mol/m³"),
    (5, "ppm"),
];

pub const OPERATION_MODES: OptionTable = &[
    (1, "eco"),
    (2, "comfort"),
    (3, "power"),
    (4, "individual"),
];

pub const LED_RING_MODES: OptionTable = &[(0, "pulsating"), (1, "permanent_on"), (2, "off")];

/// Description of a select entity
#[derive(Debug)]
pub struct SelectDescription {
    pub key: &'static str,
    pub category: Option<EntityCategory>,
    pub enabled_by_default: bool,
    pub options: OptionTable,
    pub exists_fn: fn(&Device) -> bool,
    /// Raw option code
    pub value_fn: fn(&DeviceParameters) -> Option<u8>,
}

impl SelectDescription {
    /// Labels in display order
    pub fn option_labels(&self) -> Vec<&'static str> {
        self.options.iter().map(|(_, label)| *label).collect()
    }

    pub fn label_for(&self, code: u8) -> Option<&'static str> {
        self.options
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
    }

    pub fn code_for(&self, label: &str) -> Option<u8> {
        self.options
            .iter()
            .find(|(_, l)| *l == label)
            .map(|(code, _)| *code)
    }

    /// Build the parameter mapping selecting `label`
    pub fn update_for(&self, label: &str) -> Result<ParameterUpdate> {
        let code = self.code_for(label).ok_or_else(|| {
            Error::invalid_input(format!("'{}' is not a valid option for {}", label, self.key))
        })?;
        Ok(ParameterUpdate::single(self.key, code))
    }
}

impl EntityDescription for SelectDescription {
    const PLATFORM: Platform = Platform::Select;

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
        let code = (self.value_fn)(params(device)?)?;
        self.label_for(code).map(|label| StateValue::Text(label.to_string()))
    }
}

impl Entity<SelectDescription> {
    /// Currently selected label
    pub fn current_option(&self) -> Option<&'static str> {
        let device = self.snapshot()?;
        let description = self.description();
        let code = (description.value_fn)(params(&device)?)?;
        description.label_for(code)
    }

    /// Select `label`
    ///
    /// Unknown labels fail with [`Error::InvalidInput`] without a call.
    pub async fn select_option(&self, label: &str) -> Result<()> {
        let update = self.description().update_for(label)?;
        self.write(Some(update)).await
    }
}

fn always(_: &Device) -> bool {
    true
}

pub static SELECTS: &[SelectDescription] = &[
    SelectDescription {
        key: "regeneration_mode",
        category: Some(EntityCategory::Config),
        enabled_by_default: true,
        options: REGENERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.regeneration_mode,
    },
    SelectDescription {
        key: "water_hardness_unit",
        category: Some(EntityCategory::Config),
        enabled_by_default: true,
        options: WATER_HARDNESS_UNITS,
        exists_fn: always,
        value_fn: |p| p.water_hardness_unit,
    },
    SelectDescription {
        key: "mode",
        category: Some(EntityCategory::Config),
        enabled_by_default: true,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode,
    },
    SelectDescription {
        key: "led_ring_mode",
        category: Some(EntityCategory::Config),
        enabled_by_default: false,
        options: LED_RING_MODES,
        exists_fn: always,
        value_fn: |p| p.led_ring_mode,
    },
    SelectDescription {
        key: "mode_individual_monday",
        category: None,
        enabled_by_default: false,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode_individual_monday,
    },
    SelectDescription {
        key: "mode_individual_tuesday",
        category: None,
        enabled_by_default: false,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode_individual_tuesday,
    },
    SelectDescription {
        key: "mode_individual_wednesday",
        category: None,
        enabled_by_default: false,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode_individual_wednesday,
    },
    SelectDescription {
        key: "mode_individual_thursday",
        category: None,
        enabled_by_default: false,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode_individual_thursday,
    },
    SelectDescription {
        key: "mode_individual_friday",
        category: None,
        enabled_by_default: false,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode_individual_friday,
    },
    SelectDescription {
        key: "mode_individual_saturday",
        category: None,
        enabled_by_default: false,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode_individual_saturday,
    },
    SelectDescription {
        key: "mode_individual_sunday",
        category: None,
        enabled_by_default: false,
        options: OPERATION_MODES,
        exists_fn: always,
        value_fn: |p| p.mode_individual_sunday,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterValue;

    fn select(key: &str) -> &'static SelectDescription {
        SELECTS.iter().find(|d| d.key == key).unwrap()
    }

    #[test]
    fn maps_codes_to_labels() {
        let device = Device {
            parameters: Some(DeviceParameters {
                regeneration_mode: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            select("regeneration_mode").state(&device),
            Some(StateValue::Text("individual".to_string()))
        );
    }

    #[test]
    fn unknown_code_has_no_state() {
        let device = Device {
            parameters: Some(DeviceParameters {
                mode: Some(42),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(select("mode").state(&device), None);
    }

    #[test]
    fn update_uses_option_code() {
        let update = select("mode_individual_friday").update_for("power").unwrap();
        assert_eq!(
            update.get("mode_individual_friday"),
            Some(&ParameterValue::Int(3))
        );
    }

    #[test]
    fn unknown_label_is_invalid_input() {
        let err = select("led_ring_mode").update_for("disco").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
