//! Error types for the softener integration
//!
//! Three layers of errors live here:
//! - [`ClientError`]: what a remote client reports back from the cloud service
//! - [`Error`]: the crate error surfaced by the coordinator and entities
//! - [`SetupError`]: the classification used while discovering devices

use thiserror::Error;

/// Result type alias for softener operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a [`RemoteClient`](crate::traits::RemoteClient)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection could not be established or was refused
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Login was rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The requested device does not exist for this account
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Response was missing a key or index the client expected
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Service answered with an unexpected status code
    #[error("Unexpected status {code}: {message}")]
    Status {
        /// HTTP-like status code
        code: u16,
        /// Message returned by the service
        message: String,
    },

    /// Push channel was closed by the remote side
    #[error("Push channel closed: {0}")]
    ChannelClosed(String),

    /// Any other push channel protocol error
    #[error("Push channel error: {0}")]
    Channel(String),

    /// The service refused a parameter update
    #[error("Parameter update rejected: {0}")]
    ParameterRejected(String),

    /// A device-scoped call was made before `bind()`
    #[error("Client is not bound to a device")]
    NotBound,
}

impl ClientError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a channel-closed error
    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed(msg.into())
    }

    /// Create a channel protocol error
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Create a parameter rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::ParameterRejected(msg.into())
    }
}

/// Core error type for the softener integration
#[derive(Error, Debug)]
pub enum Error {
    /// Scheduled refresh failed; carries the original error's message
    #[error("Unable to get data from API: {0}")]
    UpdateFailed(String),

    /// The service refused a user-requested parameter change
    #[error("Unable to update device parameters: {0}")]
    ParameterUpdateRejected(String),

    /// The first refresh failed, the integration cannot start yet
    #[error("Device not ready: {0}")]
    NotReady(String),

    /// Invalid input from an entity or service call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Un-normalized client errors
    #[error(transparent)]
    Client(#[from] ClientError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "update failed" error from any displayable cause
    pub fn update_failed(cause: impl std::fmt::Display) -> Self {
        Self::UpdateFailed(cause.to_string())
    }

    /// Create a parameter rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::ParameterUpdateRejected(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Errors raised while discovering devices for a new account
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Login failed, connection refused or malformed answer
    #[error("Cannot connect: {0}")]
    CannotConnect(String),

    /// The service did not answer in time
    #[error("Cannot connect (timeout): {0}")]
    CannotConnectTimeout(String),

    /// The account has no devices (or not the configured one)
    #[error("No devices found: {0}")]
    NoDevicesFound(String),

    /// Anything unexpected; details are logged where it happened
    #[error("Unknown error: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_failed_keeps_original_message() {
        let err = Error::update_failed(ClientError::malformed("missing key 'raw'"));
        assert_eq!(
            err.to_string(),
            "Unable to get data from API: Malformed response: missing key 'raw'"
        );
    }

    #[test]
    fn client_errors_stay_transparent() {
        let err: Error = ClientError::Timeout("30s".to_string()).into();
        assert_eq!(err.to_string(), "Timeout: 30s");
        assert!(matches!(err, Error::Client(ClientError::Timeout(_))));
    }
}
