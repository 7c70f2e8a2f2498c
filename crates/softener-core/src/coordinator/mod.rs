//! Refresh coordinator
//!
//! The Coordinator is responsible for:
//! - Pulling the full device state on a fixed schedule
//! - Opening the push channel after a successful pull and keeping it alive
//! - Applying pushed snapshots as they arrive
//! - Forwarding parameter writes and service calls to the client
//! - Notifying listeners whenever the visible state changes
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────┐  tick   ┌──────────────────┐  pull / keep_alive  ┌──────────────┐
//!   │  Timer   │────────▶│                  │────────────────────▶│              │
//!   └──────────┘         │   Coordinator    │                     │ RemoteClient │
//!   ┌──────────┐  push   │  (one snapshot)  │◀────────────────────│              │
//!   │ Channel  │────────▶│                  │   push messages     └──────────────┘
//!   │  task    │         └──────────────────┘
//!   └──────────┘                  │
//!                                 ▼ Update
//!                       ┌──────────────────┐
//!                       │    Listeners     │
//!                       │    (entities)    │
//!                       └──────────────────┘
//! ```
//!
//! ## State fusion
//!
//! Pulls, pushes and confirmed writes all end in the same synchronous step:
//! replace the snapshot, set the success flag, send one [`Update`]. The step
//! never awaits, so listeners always see the most recently completed
//! mutation. Pull and push may race; whichever completes last wins.

mod channel;

pub use channel::ChannelState;

use crate::config::CoordinatorConfig;
use crate::error::{ClientError, Error, Result};
use crate::model::{DailyUsage, Device, ParameterUpdate};
use crate::traits::RemoteClient;
use channel::ChannelSubscription;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What caused an [`Update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Scheduled pull (successful or failed)
    Refresh,
    /// Snapshot delivered over the push channel
    Push,
    /// Server-confirmed parameter write
    ParameterWrite,
    /// Push channel failed
    Channel,
}

/// Notification sent to listeners after the visible state changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    pub source: UpdateSource,
    pub last_update_success: bool,
}

/// Outcome of the decision point at the end of a pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelDecision {
    Started,
    AlreadyActive,
    Closing,
    Stopped,
}

/// Refresh coordinator for one device
///
/// Cheaply cloneable; every clone shares the same snapshot, channel and
/// listeners. Presentation entities hold a clone and only read through it.
///
/// ## Lifecycle
///
/// 1. Create with [`Coordinator::new()`]
/// 2. Load the first snapshot with [`Coordinator::first_refresh()`]
/// 3. Drive the schedule with [`Coordinator::run()`]
/// 4. Release everything with [`Coordinator::unload()`]
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn RemoteClient>,
    device_id: String,
    config: CoordinatorConfig,
    state: Mutex<State>,
    updates: broadcast::Sender<Update>,
    channel: Mutex<Option<ChannelSubscription>>,
    next_channel_id: AtomicU64,
    bound: AtomicBool,
    /// Host process shutdown
    shutdown: CancellationToken,
    /// Unload of this coordinator; child of `shutdown`
    stop: CancellationToken,
}

#[derive(Default)]
struct State {
    snapshot: Option<Arc<Device>>,
    last_update_success: bool,
    last_updated: Option<DateTime<Utc>>,
}

impl Coordinator {
    /// Create a coordinator for `device_id`
    ///
    /// # Parameters
    ///
    /// - `client`: Remote client, owned by this coordinator from now on
    /// - `device_id`: Cloud id of the device to bind to
    /// - `config`: Coordinator settings
    /// - `shutdown`: Cancelled when the host process shuts down
    pub fn new(
        client: Arc<dyn RemoteClient>,
        device_id: impl Into<String>,
        config: CoordinatorConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let (updates, _) = broadcast::channel(config.notification_capacity);
        let stop = shutdown.child_token();

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                device_id: device_id.into(),
                config,
                state: Mutex::new(State::default()),
                updates,
                channel: Mutex::new(None),
                next_channel_id: AtomicU64::new(0),
                bound: AtomicBool::new(false),
                shutdown,
                stop,
            }),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Name of the underlying client (for logging and diagnostics)
    pub fn client_name(&self) -> &'static str {
        self.inner.client.client_name()
    }

    pub(crate) fn client(&self) -> &Arc<dyn RemoteClient> {
        &self.inner.client
    }

    // ── Read access ──────────────────────────────────────────────

    /// Current snapshot, `None` before the first successful refresh
    pub fn current_snapshot(&self) -> Option<Arc<Device>> {
        self.inner.lock_state().snapshot.clone()
    }

    /// Whether the most recent update (pull, push or channel) succeeded
    pub fn last_update_success(&self) -> bool {
        self.inner.lock_state().last_update_success
    }

    /// When the snapshot was last replaced
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.lock_state().last_updated
    }

    /// Current push channel state
    pub fn channel_state(&self) -> ChannelState {
        self.inner
            .lock_channel()
            .as_ref()
            .map_or(ChannelState::Idle, ChannelSubscription::state)
    }

    /// Subscribe to state change notifications
    ///
    /// Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.inner.updates.subscribe()
    }

    /// Subscribe as a stream; lagging subscribers see `Err(Lagged)` items
    pub fn update_stream(&self) -> BroadcastStream<Update> {
        BroadcastStream::new(self.subscribe())
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Load the first snapshot during setup
    ///
    /// Same as [`refresh()`](Self::refresh) but reports failure as
    /// [`Error::NotReady`] so the host can retry setup later.
    pub async fn first_refresh(&self) -> Result<Arc<Device>> {
        self.refresh()
            .await
            .map_err(|err| Error::NotReady(err.to_string()))
    }

    /// Pull the full device state and replace the snapshot
    ///
    /// Binds the client on first use. Starts the push channel in the
    /// background when none is active, otherwise keeps the remote session
    /// alive.
    ///
    /// # Errors
    ///
    /// Every binding or pull failure is reported as [`Error::UpdateFailed`];
    /// the success flag is cleared and listeners are notified.
    pub async fn refresh(&self) -> Result<Arc<Device>> {
        debug!(device_id = %self.inner.device_id, "regularly updating device data");

        let device = match self.pull().await {
            Ok(device) => device,
            Err(err) => {
                let err = Error::update_failed(err);
                error!(device_id = %self.inner.device_id, error = %err, "refresh failed");
                self.inner.mark_failed(UpdateSource::Refresh, true);
                return Err(err);
            }
        };

        match self.inner.start_channel() {
            ChannelDecision::Started => debug!("push channel task started"),
            ChannelDecision::AlreadyActive => {
                if let Err(err) = self.inner.client.keep_alive().await {
                    warn!(error = %err, "keep-alive on push channel failed");
                }
            }
            ChannelDecision::Closing => debug!("push channel disconnecting, not started"),
            ChannelDecision::Stopped => debug!("coordinator stopping, push channel not started"),
        }

        Ok(self.inner.set_updated_data(device, UpdateSource::Refresh))
    }

    async fn pull(&self) -> std::result::Result<Device, ClientError> {
        let client = &self.inner.client;

        if !self.inner.bound.load(Ordering::SeqCst) {
            client.bind(&self.inner.device_id).await?;
            self.inner.bound.store(true, Ordering::SeqCst);
            info!(device_id = %self.inner.device_id, client = client.client_name(), "client bound to device");
        }

        let result = async {
            let settings = client.pull_settings().await?;
            let mut device = client.pull_realtime_parameters().await?;
            if device.parameters.is_none() {
                device.parameters = settings.parameters;
            }
            Ok(device)
        }
        .await;

        if let Err(ClientError::NotBound) = result {
            self.inner.bound.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Drive scheduled refreshes until unload or host shutdown
    ///
    /// The first tick fires one full period after the call; use
    /// [`first_refresh()`](Self::first_refresh) for the initial load. A
    /// failed or timed-out refresh never stops the schedule.
    pub async fn run(&self) {
        let period = self.inner.config.update_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            device_id = %self.inner.device_id,
            interval_secs = period.as_secs(),
            "scheduled refresh started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.inner.stop.cancelled() => break,
                _ = ticker.tick() => self.scheduled_refresh().await,
            }
        }

        info!(device_id = %self.inner.device_id, "scheduled refresh stopped");
    }

    async fn scheduled_refresh(&self) {
        let timeout = self.inner.config.refresh_timeout();
        match tokio::time::timeout(timeout, self.refresh()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => debug!(error = %err, "retrying on next scheduled refresh"),
            Err(_) => {
                self.inner.mark_failed(UpdateSource::Refresh, true);
                error!(
                    timeout_secs = timeout.as_secs(),
                    "scheduled refresh timed out"
                );
            }
        }
    }

    // ── Push ─────────────────────────────────────────────────────

    /// Replace the snapshot with a pushed one and notify listeners
    ///
    /// Never triggers a refresh and never touches the channel.
    pub fn apply_pushed_update(&self, device: Device) {
        self.inner.set_updated_data(device, UpdateSource::Push);
    }

    // ── Writes and services ──────────────────────────────────────

    /// Change device parameters
    ///
    /// On success the snapshot becomes the state confirmed by the service,
    /// not the locally requested values.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`]: empty update
    /// - [`Error::ParameterUpdateRejected`]: the service refused the change;
    ///   the snapshot is left unchanged
    /// - [`Error::Client`]: any other client failure, un-normalized
    pub async fn request_parameter_update(&self, update: ParameterUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(Error::invalid_input("No parameters to update"));
        }

        debug!(parameters = ?update.keys().collect::<Vec<_>>(), "updating device parameters");

        match self.inner.client.update_parameters(&update).await {
            Ok(device) => {
                self.inner.set_updated_data(device, UpdateSource::ParameterWrite);
                Ok(())
            }
            Err(ClientError::ParameterRejected(reason)) => {
                warn!(reason = %reason, "parameter update rejected");
                Err(Error::rejected(reason))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Start a manual regeneration
    pub async fn request_regeneration(&self) -> Result<()> {
        self.inner.client.trigger_regeneration().await?;
        info!(device_id = %self.inner.device_id, "manual regeneration requested");
        Ok(())
    }

    /// Daily salt usage, oldest first; empty when nothing was recorded
    pub async fn get_salt_history(&self) -> Result<Vec<DailyUsage>> {
        let device = self.inner.client.fetch_salt_history().await?;
        Ok(device.salt.unwrap_or_default())
    }

    /// Daily water usage, oldest first; empty when nothing was recorded
    pub async fn get_water_history(&self) -> Result<Vec<DailyUsage>> {
        let device = self.inner.client.fetch_water_history().await?;
        Ok(device.water.unwrap_or_default())
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Close the push channel, if any
    ///
    /// Idempotent and infallible: failures are logged. Waits for the channel
    /// task to finish (bounded by `teardown_timeout_secs`).
    ///
    /// The subscription keeps the slot until its task has finished, so a
    /// refresh racing the disconnect cannot start a second channel.
    pub async fn disconnect(&self) {
        let teardown = self
            .inner
            .lock_channel()
            .as_mut()
            .and_then(ChannelSubscription::begin_close);

        if let Err(err) = self.inner.client.close_channel().await {
            warn!(error = %err, "closing push channel failed");
        }

        let Some(teardown) = teardown else {
            return;
        };

        let id = teardown.id();
        let timeout = self.inner.config.teardown_timeout();
        if !teardown.finish(timeout).await {
            warn!(
                timeout_secs = timeout.as_secs(),
                "push channel task did not stop in time, aborted"
            );
            if let Err(err) = self.inner.client.close_channel().await {
                warn!(error = %err, "closing push channel failed");
            }
        }
        self.inner.release_channel(id);
    }

    /// Stop the schedule, refuse new channels and release the open one
    ///
    /// Returns once the push channel is released.
    pub async fn unload(&self) {
        self.inner.stop.cancel();
        self.disconnect().await;
        info!(device_id = %self.inner.device_id, "coordinator unloaded");
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_channel(&self) -> MutexGuard<'_, Option<ChannelSubscription>> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the snapshot and notify, without suspending
    fn set_updated_data(&self, device: Device, source: UpdateSource) -> Arc<Device> {
        let device = Arc::new(device);
        let mut state = self.lock_state();
        state.snapshot = Some(Arc::clone(&device));
        state.last_update_success = true;
        state.last_updated = Some(Utc::now());
        self.notify(source, true);
        device
    }

    /// Clear the success flag, optionally notifying listeners
    fn mark_failed(&self, source: UpdateSource, notify: bool) {
        let mut state = self.lock_state();
        state.last_update_success = false;
        if notify {
            self.notify(source, false);
        }
    }

    fn notify(&self, source: UpdateSource, last_update_success: bool) {
        // No subscribers is not an error
        let _ = self.updates.send(Update {
            source,
            last_update_success,
        });
    }

    /// Decision point: start the push channel unless one is held
    fn start_channel(self: &Arc<Self>) -> ChannelDecision {
        let mut slot = self.lock_channel();
        match slot.as_ref().map(ChannelSubscription::state) {
            Some(ChannelState::Closing) => return ChannelDecision::Closing,
            Some(_) => return ChannelDecision::AlreadyActive,
            None => {}
        }
        if self.stop.is_cancelled() {
            return ChannelDecision::Stopped;
        }

        let id = self.next_channel_id.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(ChannelSubscription::spawn(Arc::clone(self), id));
        ChannelDecision::Started
    }

    /// Drop the subscription `id` if it is still the held one
    fn release_channel(&self, id: u64) {
        let mut slot = self.lock_channel();
        if slot.as_ref().is_some_and(|sub| sub.id() == id) {
            *slot = None;
        }
    }

    /// Update the state of subscription `id`
    ///
    /// `false` if it is no longer held or is being disconnected.
    fn set_channel_state(&self, id: u64, state: ChannelState) -> bool {
        match self.lock_channel().as_mut() {
            Some(sub) if sub.id() == id && sub.state() != ChannelState::Closing => {
                sub.set_state(state);
                true
            }
            _ => false,
        }
    }
}
