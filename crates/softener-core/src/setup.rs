//! Account setup and device discovery
//!
//! Runs before a coordinator exists: check the credentials, list the
//! devices of the account and pick the one to coordinate. Failures are
//! classified into [`SetupError`] so the caller can show a meaningful
//! message and decide whether retrying makes sense.

use crate::error::{ClientError, SetupError};
use crate::model::DeviceSummary;
use crate::traits::RemoteClient;
use tracing::{debug, error, warn};

/// Log in and list the devices of the account
///
/// # Errors
///
/// - [`SetupError::CannotConnect`]: credentials refused, connection refused
///   or an answer the client could not understand
/// - [`SetupError::CannotConnectTimeout`]: the service did not answer in time
/// - [`SetupError::NoDevicesFound`]: the account has no devices
/// - [`SetupError::Unknown`]: anything else (logged here)
pub async fn discover_devices(client: &dyn RemoteClient) -> Result<Vec<DeviceSummary>, SetupError> {
    match client.login().await {
        Ok(true) => {}
        Ok(false) => {
            return Err(SetupError::CannotConnect(
                "Unable to login to the cloud service".to_string(),
            ));
        }
        Err(err) => return Err(classify(err)),
    }

    let devices = client.list_devices().await.map_err(classify)?;
    debug!(count = devices.len(), "got devices");

    if devices.is_empty() {
        return Err(SetupError::NoDevicesFound(
            "Unable to find devices".to_string(),
        ));
    }

    Ok(devices)
}

/// Pick the configured device, or the first one when none is configured
pub fn select_device<'a>(
    devices: &'a [DeviceSummary],
    device_id: Option<&str>,
) -> Result<&'a DeviceSummary, SetupError> {
    match device_id {
        Some(id) => devices
            .iter()
            .find(|device| device.id == id)
            .ok_or_else(|| SetupError::NoDevicesFound(format!("Device '{}' not found", id))),
        None => devices
            .first()
            .ok_or_else(|| SetupError::NoDevicesFound("Unable to find devices".to_string())),
    }
}

fn classify(err: ClientError) -> SetupError {
    match err {
        ClientError::Timeout(_) => {
            warn!(error = %err, "timeout during setup");
            SetupError::CannotConnectTimeout(err.to_string())
        }
        ClientError::Connection(_)
        | ClientError::MalformedResponse(_)
        | ClientError::Authentication(_) => {
            warn!(error = %err, "cannot connect during setup");
            SetupError::CannotConnect(err.to_string())
        }
        other => {
            error!(error = %other, "unexpected error during setup");
            SetupError::Unknown(other.to_string())
        }
    }
}
