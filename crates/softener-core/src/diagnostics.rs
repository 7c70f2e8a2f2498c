//! Diagnostics export
//!
//! Produces a JSON document describing one configured device for bug
//! reports. Credentials are replaced by [`REDACTED`], and so is every
//! occurrence of the device serial number (in values and in keys,
//! case-insensitively).

use crate::config::SoftenerConfig;
use crate::coordinator::Coordinator;
use crate::entity::{DeviceInfo, EntitySet};
use crate::error::Result;
use serde_json::{Map, Value, json};
use std::borrow::Cow;
use tracing::warn;

/// Replacement for redacted data
pub const REDACTED: &str = "**REDACTED**";

const TO_REDACT: &[&str] = &["username", "password"];

/// Collect diagnostics for one configured device
///
/// # Parameters
///
/// - `config`: The device's configuration (credentials are redacted)
/// - `coordinator`: Source of the snapshot and client diagnostics
/// - `entities`: Entities built for the device, if any
pub async fn config_diagnostics(
    config: &SoftenerConfig,
    coordinator: &Coordinator,
    entities: Option<&EntitySet>,
) -> Result<Value> {
    let entry = redact_keys(serde_json::to_value(config)?, TO_REDACT);

    let client = match coordinator.client().diagnostics().await {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "client diagnostics unavailable");
            json!({ "error": err.to_string() })
        }
    };

    let snapshot = coordinator.current_snapshot();
    let mut data = json!({
        "entry": entry,
        "coordinator": {
            "client": client,
            "last_update_success": coordinator.last_update_success(),
            "last_updated": coordinator.last_updated(),
            "channel_state": format!("{:?}", coordinator.channel_state()),
            "snapshot": snapshot.as_deref(),
        },
    });

    if let (Some(device), Some(entities)) = (snapshot.as_deref(), entities) {
        let states: Map<String, Value> = entities
            .states()
            .into_iter()
            .map(|(id, state)| (id, serde_json::to_value(state).unwrap_or(Value::Null)))
            .collect();

        data["device"] = json!({
            "info": DeviceInfo::from(device),
            "entities": states,
        });
    }

    let Some(serial_number) = snapshot.map(|device| device.serial_number.clone()) else {
        return Ok(data);
    };
    Ok(redact_serial_number(&serial_number, data))
}

/// Replace the values of `keys` anywhere in `value`
fn redact_keys(value: Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if keys.contains(&key.as_str()) && !value.is_null() {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact_keys(value, keys))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| redact_keys(v, keys)).collect())
        }
        other => other,
    }
}

/// Replace `serial_number` in every string and object key of `value`
pub fn redact_serial_number(serial_number: &str, value: Value) -> Value {
    match value {
        Value::String(s) => match replace_ignore_case(&s, serial_number) {
            Cow::Borrowed(_) => Value::String(s),
            Cow::Owned(replaced) => Value::String(replaced),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| redact_serial_number(serial_number, v))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key = replace_ignore_case(&key, serial_number).into_owned();
                    (key, redact_serial_number(serial_number, value))
                })
                .collect(),
        ),
        other => other,
    }
}

/// ASCII case-insensitive replace of `needle` by [`REDACTED`]
fn replace_ignore_case<'a>(haystack: &'a str, needle: &str) -> Cow<'a, str> {
    if needle.is_empty() {
        return Cow::Borrowed(haystack);
    }

    // ASCII lowercasing keeps byte offsets intact
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::new();
    let mut last = 0;
    for (start, _) in lower_haystack.match_indices(&lower_needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(REDACTED);
        last = start + needle.len();
    }

    if last == 0 {
        return Cow::Borrowed(haystack);
    }
    out.push_str(&haystack[last..]);
    Cow::Owned(out)
}
