//! Contract Test: Push Channel Lifecycle
//!
//! Constraints verified:
//! - Pushed snapshots replace the current one and notify listeners, without a pull
//! - At most one channel is held at a time
//! - A remote close clears the success flag without a notification
//! - Any other channel failure clears the flag and notifies once
//! - Every failure path releases the channel; the next refresh opens a new one
//! - The coordinator never reopens the channel on its own

mod common;

use common::*;
use softener_core::{ChannelState, ClientError, Update, UpdateSource};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

async fn listening(coordinator: &softener_core::Coordinator) {
    wait_until("channel listening", || {
        coordinator.channel_state() == ChannelState::Listening
    })
    .await;
}

async fn idle(coordinator: &softener_core::Coordinator) {
    wait_until("channel released", || {
        coordinator.channel_state() == ChannelState::Idle
    })
    .await;
}

#[tokio::test]
async fn pushed_snapshot_replaces_state_and_notifies() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;

    let mut updates = coordinator.subscribe();
    client.script(ChannelScript::Push(device_with_raw_water(9.5)));

    let update = tokio::time::timeout(Duration::from_secs(2), updates.recv())
        .await
        .expect("notification arrives")
        .unwrap();
    assert_eq!(
        update,
        Update {
            source: UpdateSource::Push,
            last_update_success: true
        }
    );
    assert_eq!(*coordinator.current_snapshot().unwrap(), device_with_raw_water(9.5));
    assert_eq!(
        ScriptedClient::count(&client.pull_calls),
        1,
        "a push never triggers a pull"
    );

    coordinator.unload().await;
}

#[tokio::test]
async fn remote_close_clears_flag_without_notification() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;

    let mut updates = coordinator.subscribe();
    client.script(ChannelScript::Fail(ClientError::channel_closed("going away")));
    idle(&coordinator).await;

    assert!(!coordinator.last_update_success());
    assert_eq!(updates.try_recv(), Err(TryRecvError::Empty));
    assert!(
        ScriptedClient::count(&client.close_calls) >= 1,
        "cleanup closes the channel"
    );

    // Not reopened until the next scheduled refresh
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ScriptedClient::count(&client.open_calls), 1);

    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;
    assert_eq!(ScriptedClient::count(&client.open_calls), 2);
    assert!(coordinator.last_update_success());

    coordinator.unload().await;
}

#[tokio::test]
async fn other_channel_error_notifies_once() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;

    let mut updates = coordinator.subscribe();
    client.script(ChannelScript::Fail(ClientError::channel("bad frame")));
    idle(&coordinator).await;

    assert!(!coordinator.last_update_success());
    assert_eq!(
        updates.try_recv().unwrap(),
        Update {
            source: UpdateSource::Channel,
            last_update_success: false
        }
    );
    assert_eq!(updates.try_recv(), Err(TryRecvError::Empty), "exactly one");

    coordinator.unload().await;
}

#[tokio::test]
async fn open_failure_releases_slot() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);

    client.fail_next_open(ClientError::connection("negotiate failed"));
    coordinator.refresh().await.unwrap();

    wait_until("open attempted", || {
        ScriptedClient::count(&client.open_calls) == 1
    })
    .await;
    idle(&coordinator).await;
    assert_eq!(ScriptedClient::count(&client.listen_calls), 0);
    assert!(coordinator.last_update_success(), "the pull itself succeeded");

    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;
    assert_eq!(ScriptedClient::count(&client.open_calls), 2);
    assert_eq!(ScriptedClient::count(&client.keep_alive_calls), 0);

    coordinator.unload().await;
}

#[tokio::test]
async fn panicking_listener_still_releases_channel() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;

    let mut updates = coordinator.subscribe();
    client.script(ChannelScript::Panic);
    idle(&coordinator).await;

    assert!(!coordinator.last_update_success());
    assert_eq!(updates.try_recv().unwrap().source, UpdateSource::Channel);

    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;
    assert_eq!(ScriptedClient::count(&client.open_calls), 2);

    coordinator.unload().await;
}

#[tokio::test]
async fn concurrent_refreshes_open_one_channel() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);

    let (a, b, c) = tokio::join!(
        coordinator.refresh(),
        coordinator.refresh(),
        coordinator.refresh()
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    listening(&coordinator).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ScriptedClient::count(&client.open_calls), 1);

    coordinator.unload().await;
}

#[tokio::test]
async fn pushes_after_channel_failure_are_not_applied() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    listening(&coordinator).await;

    client.script(ChannelScript::Fail(ClientError::channel("reset")));
    client.script(ChannelScript::Push(device_with_raw_water(1.0)));
    idle(&coordinator).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*coordinator.current_snapshot().unwrap(), sample_device());

    coordinator.unload().await;
}
