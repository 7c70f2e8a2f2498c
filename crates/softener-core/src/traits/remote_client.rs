// # Remote Client Trait
//
// Defines the interface to the cloud service that owns the softener.
//
// ## Implementations
//
// - Simulated account: `softener-client-sim` crate
// - Future: the vendor cloud (login, REST pulls, WebSocket push)
//
// ## Usage
//
// ```rust,ignore
// use softener_core::RemoteClient;
// use std::sync::Arc;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* RemoteClient implementation */;
//
//     client.bind("softliQ.D/BS12345").await?;
//     let device = client.pull_realtime_parameters().await?;
//     println!("raw water: {:?}", device.realtime.and_then(|r| r.raw_water));
//
//     client.open_channel().await?;
//     client.listen(Arc::new(|device| println!("pushed: {}", device.id))).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{ClientConfig, Credentials};
use crate::error::ClientError;
use crate::model::{Device, DeviceSummary, ParameterUpdate};

/// Callback invoked by [`RemoteClient::listen`] once per inbound push message
///
/// The client must finish one invocation before reading the next message.
pub type PushCallback = Arc<dyn Fn(Device) + Send + Sync>;

/// Trait for remote client implementations
///
/// A client performs the authenticated request/response calls against the
/// cloud service and optionally provides a push channel. Every call that
/// returns a [`Device`] returns the *full* device state as the client knows
/// it after the call; the coordinator replaces its snapshot wholesale and
/// never merges.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform network I/O against the cloud service
/// - ✅ Keep session state (tokens, bound device, open connection)
/// - ✅ Enforce per-call timeouts
///
/// ## Forbidden Capabilities
/// - ❌ Schedule refreshes or reconnect the push channel on its own
/// - ❌ Hold on to the push callback after `listen()` returns
/// - ❌ Retry rejected parameter updates
///
/// Scheduling, reconnection and state fusion belong to the
/// [`Coordinator`](crate::Coordinator).
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Log in to the account
    ///
    /// Returns `Ok(false)` when the service answered but refused the
    /// credentials.
    async fn login(&self) -> Result<bool, ClientError>;

    /// List the devices registered on the account
    async fn list_devices(&self) -> Result<Vec<DeviceSummary>, ClientError>;

    /// Associate the client with one device
    ///
    /// Fails with [`ClientError::DeviceNotFound`] or a connection error.
    async fn bind(&self, device_id: &str) -> Result<(), ClientError>;

    /// Pull device information and settings
    async fn pull_settings(&self) -> Result<Device, ClientError>;

    /// Pull live measurement values
    async fn pull_realtime_parameters(&self) -> Result<Device, ClientError>;

    /// Open the push channel
    async fn open_channel(&self) -> Result<(), ClientError>;

    /// Read push messages until the channel closes or fails
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The channel was closed locally via [`close_channel`](Self::close_channel)
    /// - `Err(ClientError::ChannelClosed)`: The remote side closed the channel
    /// - `Err(_)`: Any other channel failure
    async fn listen(&self, on_message: PushCallback) -> Result<(), ClientError>;

    /// Close the push channel
    ///
    /// Must be idempotent: closing when nothing is open is a no-op. A close
    /// issued after `open_channel()` but before `listen()` must still make
    /// the following `listen()` return.
    async fn close_channel(&self) -> Result<(), ClientError>;

    /// Keep the remote session alive while the push channel is open
    async fn keep_alive(&self) -> Result<(), ClientError>;

    /// Change device parameters
    ///
    /// Returns the device state as confirmed by the service. Refusals are
    /// reported as [`ClientError::ParameterRejected`].
    async fn update_parameters(&self, update: &ParameterUpdate) -> Result<Device, ClientError>;

    /// Fetch the salt usage history; `Device::salt` may be absent when the
    /// device never recorded any
    async fn fetch_salt_history(&self) -> Result<Device, ClientError>;

    /// Fetch the water usage history; `Device::water` may be absent
    async fn fetch_water_history(&self) -> Result<Device, ClientError>;

    /// Start a manual regeneration
    async fn trigger_regeneration(&self) -> Result<(), ClientError>;

    /// Client-side diagnostics (raw responses, session info)
    async fn diagnostics(&self) -> Result<serde_json::Value, ClientError> {
        Ok(serde_json::Value::Null)
    }

    /// Get the client name (for logging)
    fn client_name(&self) -> &'static str;
}

/// Helper trait for constructing remote clients from configuration
pub trait RemoteClientFactory: Send + Sync {
    /// Create a RemoteClient instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this client type
    /// - `credentials`: Account credentials
    fn create(
        &self,
        config: &ClientConfig,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteClient>, crate::Error>;
}
