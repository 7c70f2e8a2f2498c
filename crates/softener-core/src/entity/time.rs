// # Times
//
// Regeneration start times, three slots per weekday.

use super::{Entity, EntityCategory, EntityDescription, Platform, StateValue, params};
use crate::error::Result;
use crate::model::{Device, DeviceParameters, ParameterUpdate};
use chrono::NaiveTime;

/// Description of a time entity
#[derive(Debug)]
pub struct TimeDescription {
    pub key: &'static str,
    pub category: Option<EntityCategory>,
    pub enabled_by_default: bool,
    pub exists_fn: fn(&Device) -> bool,
    pub value_fn: fn(&DeviceParameters) -> Option<NaiveTime>,
    pub update_fn: Option<fn(NaiveTime) -> ParameterUpdate>,
}

impl EntityDescription for TimeDescription {
    const PLATFORM: Platform = Platform::Time;

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
        (self.value_fn)(params(device)?).map(StateValue::Time)
    }
}

impl Entity<TimeDescription> {
    pub fn value(&self) -> Option<NaiveTime> {
        let device = self.snapshot()?;
        (self.description().value_fn)(params(&device)?)
    }

    pub async fn set_value(&self, value: NaiveTime) -> Result<()> {
        self.write(self.description().update_fn.map(|update| update(value)))
            .await
    }
}

macro_rules! time {
    ($($field:ident),* $(,)?) => {
        &[$(
            TimeDescription {
                key: stringify!($field),
                category: Some(EntityCategory::Config),
                enabled_by_default: false,
                exists_fn: |_| true,
                value_fn: |p| p.$field,
                update_fn: Some(|value| ParameterUpdate::single(stringify!($field), value)),
            },
        )*]
    };
}

pub static TIMES: &[TimeDescription] = time![
    regeneration_time_monday_1,
    regeneration_time_monday_2,
    regeneration_time_monday_3,
    regeneration_time_tuesday_1,
    regeneration_time_tuesday_2,
    regeneration_time_tuesday_3,
    regeneration_time_wednesday_1,
    regeneration_time_wednesday_2,
    regeneration_time_wednesday_3,
    regeneration_time_thursday_1,
    regeneration_time_thursday_2,
    regeneration_time_thursday_3,
    regeneration_time_friday_1,
    regeneration_time_friday_2,
    regeneration_time_friday_3,
    regeneration_time_saturday_1,
    regeneration_time_saturday_2,
    regeneration_time_saturday_3,
    regeneration_time_sunday_1,
    regeneration_time_sunday_2,
    regeneration_time_sunday_3,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterValue;

    #[test]
    fn update_carries_time_value() {
        let at = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let description = TIMES
            .iter()
            .find(|d| d.key == "regeneration_time_sunday_3")
            .unwrap();

        let update = (description.update_fn.unwrap())(at);
        assert_eq!(
            update.get("regeneration_time_sunday_3"),
            Some(&ParameterValue::Time(at))
        );

        let params = DeviceParameters::default().with_update(&update).unwrap();
        assert_eq!(
            description.state(&Device {
                parameters: Some(params),
                ..Default::default()
            }),
            Some(StateValue::Time(at))
        );
    }
}
