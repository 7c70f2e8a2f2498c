// # Push Channel Task
//
// One background task per channel lifetime:
//
//   open_channel ──▶ listen (until closed/failed) ──▶ close_channel ──▶ release slot
//
// The task never reopens the channel. The next scheduled refresh finds the
// slot empty and starts a new task.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Inner, UpdateSource};
use crate::error::ClientError;
use crate::traits::{PushCallback, RemoteClient};

/// Push channel state as seen by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No channel held
    Idle,
    /// Task started, channel not yet open
    Connecting,
    /// Channel open and listening
    Listening,
    /// Disconnect in progress; the slot stays held until the task is gone
    Closing,
}

/// The single push channel held by a coordinator
pub(super) struct ChannelSubscription {
    id: u64,
    state: ChannelState,
    // Moved out by `begin_close`, otherwise dropped with the subscription
    teardown: Option<Teardown>,
}

impl ChannelSubscription {
    /// Spawn the channel task for subscription `id`
    ///
    /// Called with the channel slot locked, so the task cannot release the
    /// slot before the subscription is stored.
    pub(super) fn spawn(inner: Arc<Inner>, id: u64) -> Self {
        let hook = ShutdownHook::register(inner.shutdown.clone(), Arc::clone(&inner.client));
        let task = tokio::spawn(run_channel(inner, id));

        Self {
            id,
            state: ChannelState::Connecting,
            teardown: Some(Teardown { id, hook, task }),
        }
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }

    pub(super) fn state(&self) -> ChannelState {
        self.state
    }

    pub(super) fn set_state(&mut self, state: ChannelState) {
        self.state = state;
    }

    /// Mark the subscription as closing and hand out its task
    ///
    /// `None` if another disconnect already took it.
    pub(super) fn begin_close(&mut self) -> Option<Teardown> {
        let teardown = self.teardown.take()?;
        self.state = ChannelState::Closing;
        Some(teardown)
    }
}

/// Task and shutdown hook of a subscription being disconnected
pub(super) struct Teardown {
    id: u64,
    hook: ShutdownHook,
    task: JoinHandle<()>,
}

impl Teardown {
    pub(super) fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the task to finish, aborting it after `timeout`
    ///
    /// Returns `false` if the task had to be aborted.
    pub(super) async fn finish(self, timeout: Duration) -> bool {
        let Self { hook, mut task, .. } = self;
        drop(hook);

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(_) => {
                debug!("push channel task finished");
                true
            }
            Err(_) => {
                task.abort();
                false
            }
        }
    }
}

/// Closes the channel when the host shuts down
///
/// Registered when the channel task starts, deregistered when the
/// subscription is dropped.
struct ShutdownHook {
    task: JoinHandle<()>,
}

impl ShutdownHook {
    fn register(shutdown: CancellationToken, client: Arc<dyn RemoteClient>) -> Self {
        let task = tokio::spawn(async move {
            shutdown.cancelled().await;
            debug!("host shutting down, closing push channel");
            if let Err(err) = client.close_channel().await {
                warn!(error = %err, "closing push channel on shutdown failed");
            }
        });
        Self { task }
    }
}

impl Drop for ShutdownHook {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> AbortOnDrop<T> {
    async fn join(mut self) -> Result<T, JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_channel(inner: Arc<Inner>, id: u64) {
    let client = Arc::clone(&inner.client);

    if let Err(err) = client.open_channel().await {
        error!(error = %err, "unable to open push channel");
        inner.release_channel(id);
        return;
    }

    // Unload or shutdown may have raced the open
    if inner.stop.is_cancelled() || !inner.set_channel_state(id, ChannelState::Listening) {
        debug!("push channel released while opening, closing it");
        if let Err(err) = client.close_channel().await {
            warn!(error = %err, "closing push channel failed");
        }
        inner.release_channel(id);
        return;
    }
    info!(client = client.client_name(), "push channel open, listening for updates");

    // Run listen in its own task so a panicking client still reaches cleanup
    let on_message = push_callback(Arc::downgrade(&inner));
    let listener = AbortOnDrop(tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.listen(on_message).await }
    }));

    match listener.join().await {
        Ok(Ok(())) => debug!("push channel closed locally"),
        Ok(Err(ClientError::ChannelClosed(reason))) => {
            inner.mark_failed(UpdateSource::Channel, false);
            error!(reason = %reason, "push channel closed by remote");
        }
        Ok(Err(err)) => {
            inner.mark_failed(UpdateSource::Channel, true);
            error!(error = %err, "push channel failed");
        }
        Err(err) => {
            inner.mark_failed(UpdateSource::Channel, true);
            error!(error = %err, "push channel listener aborted");
        }
    }

    if let Err(err) = client.close_channel().await {
        warn!(error = %err, "closing push channel failed");
    }
    inner.release_channel(id);
}

fn push_callback(inner: Weak<Inner>) -> PushCallback {
    Arc::new(move |device| {
        if let Some(inner) = inner.upgrade() {
            inner.set_updated_data(device, UpdateSource::Push);
            debug!("applied pushed update");
        }
    })
}
