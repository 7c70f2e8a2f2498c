//! Contract Test: State Fusion
//!
//! Constraints verified:
//! - Pull and push results are never merged; the last completed update wins
//! - Every applied update produces exactly one notification
//! - A late pull completing after a push overwrites the pushed state

mod common;

use common::*;
use softener_core::{ChannelState, UpdateSource};
use std::time::Duration;

#[tokio::test]
async fn push_after_pull_wins() {
    let client = ScriptedClient::new(device_with_raw_water(10.0));
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    wait_until("channel listening", || {
        coordinator.channel_state() == ChannelState::Listening
    })
    .await;

    client.script(ChannelScript::Push(device_with_raw_water(20.0)));
    wait_until("push applied", || {
        coordinator.current_snapshot().unwrap().realtime.as_ref().unwrap().raw_water == Some(20.0)
    })
    .await;

    assert_eq!(*coordinator.current_snapshot().unwrap(), device_with_raw_water(20.0));

    coordinator.unload().await;
}

#[tokio::test]
async fn slow_pull_completing_after_push_wins() {
    let client = ScriptedClient::new(device_with_raw_water(10.0));
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    wait_until("channel listening", || {
        coordinator.channel_state() == ChannelState::Listening
    })
    .await;

    // Pull starts with state 30, a push of 20 lands while it is in flight
    client.set_device(device_with_raw_water(30.0));
    client.delay_pulls(Duration::from_millis(200));

    let mut updates = coordinator.subscribe();
    let pull = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.refresh().await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    client.script(ChannelScript::Push(device_with_raw_water(20.0)));

    pull.await.unwrap().unwrap();

    assert_eq!(*coordinator.current_snapshot().unwrap(), device_with_raw_water(30.0));

    let first = updates.recv().await.unwrap();
    let second = updates.recv().await.unwrap();
    assert_eq!(first.source, UpdateSource::Push);
    assert_eq!(second.source, UpdateSource::Refresh);
    assert!(updates.try_recv().is_err(), "one notification per update");

    coordinator.unload().await;
}

#[tokio::test]
async fn listeners_see_the_state_they_were_notified_about() {
    let client = ScriptedClient::new(sample_device());
    let (coordinator, _shutdown) = coordinator_for(&client);
    coordinator.refresh().await.unwrap();
    wait_until("channel listening", || {
        coordinator.channel_state() == ChannelState::Listening
    })
    .await;

    let mut updates = coordinator.subscribe();
    for raw_water in [1.0, 2.0, 3.0] {
        client.script(ChannelScript::Push(device_with_raw_water(raw_water)));
    }

    for _ in 0..3 {
        let update = updates.recv().await.unwrap();
        assert_eq!(update.source, UpdateSource::Push);
        assert!(update.last_update_success);
    }
    assert_eq!(*coordinator.current_snapshot().unwrap(), device_with_raw_water(3.0));

    coordinator.unload().await;
}
