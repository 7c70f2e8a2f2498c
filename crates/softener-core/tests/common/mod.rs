//! Test doubles and common utilities for coordinator contract tests
//!
//! `ScriptedClient` answers pulls from an in-memory device, counts every
//! call and exposes a push channel the test drives message by message.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use softener_core::config::CoordinatorConfig;
use softener_core::model::{DailyUsage, DeviceParameters, Realtime};
use softener_core::{
    ClientError, Coordinator, Device, DeviceSummary, ParameterUpdate, PushCallback, RemoteClient,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const SERIAL: &str = "BS12345";
pub const DEVICE_ID: &str = "softliQ.D/BS12345";

/// One scripted event on the push channel
#[derive(Debug)]
pub enum ChannelScript {
    /// Deliver a pushed snapshot
    Push(Device),
    /// Fail `listen()` with this error
    Fail(ClientError),
    /// `listen()` returns `Ok(())` (local close)
    Closed,
    /// `listen()` panics
    Panic,
}

/// A RemoteClient whose answers are scripted by the test
pub struct ScriptedClient {
    device: Mutex<Device>,
    pull_failures: Mutex<VecDeque<ClientError>>,
    pull_delay: Mutex<Option<Duration>>,
    open_failure: Mutex<Option<ClientError>>,
    keep_alive_failure: Mutex<Option<ClientError>>,
    update_response: Mutex<Option<Result<Device, ClientError>>>,
    login_result: Mutex<Result<bool, ClientError>>,
    devices: Mutex<Vec<DeviceSummary>>,
    last_update: Mutex<Option<ParameterUpdate>>,

    channel_tx: mpsc::UnboundedSender<ChannelScript>,
    channel_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ChannelScript>>,
    open: AtomicBool,

    pub bind_calls: AtomicUsize,
    pub pull_calls: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub listen_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub keep_alive_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub salt_calls: AtomicUsize,
    pub water_calls: AtomicUsize,
    pub regeneration_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(device: Device) -> Arc<Self> {
        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        let summary = DeviceSummary::from(&device);

        Arc::new(Self {
            device: Mutex::new(device),
            pull_failures: Mutex::new(VecDeque::new()),
            pull_delay: Mutex::new(None),
            open_failure: Mutex::new(None),
            keep_alive_failure: Mutex::new(None),
            update_response: Mutex::new(None),
            login_result: Mutex::new(Ok(true)),
            devices: Mutex::new(vec![summary]),
            last_update: Mutex::new(None),
            channel_tx,
            channel_rx: tokio::sync::Mutex::new(channel_rx),
            open: AtomicBool::new(false),
            bind_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
            open_calls: AtomicUsize::new(0),
            listen_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            keep_alive_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            salt_calls: AtomicUsize::new(0),
            water_calls: AtomicUsize::new(0),
            regeneration_calls: AtomicUsize::new(0),
        })
    }

    /// Replace the device state answered by the next pulls
    pub fn set_device(&self, device: Device) {
        *self.device.lock().unwrap() = device;
    }

    pub fn device(&self) -> Device {
        self.device.lock().unwrap().clone()
    }

    /// Make the next pull fail with `err`
    pub fn fail_next_pull(&self, err: ClientError) {
        self.pull_failures.lock().unwrap().push_back(err);
    }

    /// Delay every pull by `delay`
    pub fn delay_pulls(&self, delay: Duration) {
        *self.pull_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_next_open(&self, err: ClientError) {
        *self.open_failure.lock().unwrap() = Some(err);
    }

    pub fn fail_keep_alive(&self, err: ClientError) {
        *self.keep_alive_failure.lock().unwrap() = Some(err);
    }

    /// Answer the next parameter update with `response` instead of applying it
    pub fn respond_to_update(&self, response: Result<Device, ClientError>) {
        *self.update_response.lock().unwrap() = Some(response);
    }

    pub fn set_login_result(&self, result: Result<bool, ClientError>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn set_devices(&self, devices: Vec<DeviceSummary>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn last_update(&self) -> Option<ParameterUpdate> {
        self.last_update.lock().unwrap().clone()
    }

    /// Queue an event on the push channel
    pub fn script(&self, event: ChannelScript) {
        let _ = self.channel_tx.send(event);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn pull(&self) -> Result<Device, ClientError> {
        let delay = *self.pull_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.pull_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.device())
    }
}

#[async_trait]
impl RemoteClient for ScriptedClient {
    async fn login(&self) -> Result<bool, ClientError> {
        self.login_result.lock().unwrap().clone()
    }

    async fn list_devices(&self) -> Result<Vec<DeviceSummary>, ClientError> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn bind(&self, device_id: &str) -> Result<(), ClientError> {
        self.bind_calls.fetch_add(1, Ordering::SeqCst);
        if device_id != self.device().id {
            return Err(ClientError::DeviceNotFound(device_id.to_string()));
        }
        Ok(())
    }

    async fn pull_settings(&self) -> Result<Device, ClientError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.pull().await
    }

    async fn pull_realtime_parameters(&self) -> Result<Device, ClientError> {
        self.pull().await
    }

    async fn open_channel(&self) -> Result<(), ClientError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.open_failure.lock().unwrap().take() {
            return Err(err);
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn listen(&self, on_message: PushCallback) -> Result<(), ClientError> {
        self.listen_calls.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.channel_rx.lock().await;

        loop {
            match rx.recv().await {
                Some(ChannelScript::Push(device)) => on_message(device),
                Some(ChannelScript::Closed) => return Ok(()),
                Some(ChannelScript::Fail(err)) => {
                    self.open.store(false, Ordering::SeqCst);
                    return Err(err);
                }
                Some(ChannelScript::Panic) => {
                    self.open.store(false, Ordering::SeqCst);
                    panic!("scripted listen panic");
                }
                None => return Err(ClientError::channel("script ended")),
            }
        }
    }

    async fn close_channel(&self) -> Result<(), ClientError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.channel_tx.send(ChannelScript::Closed);
        }
        Ok(())
    }

    async fn keep_alive(&self) -> Result<(), ClientError> {
        self.keep_alive_calls.fetch_add(1, Ordering::SeqCst);
        match self.keep_alive_failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn update_parameters(&self, update: &ParameterUpdate) -> Result<Device, ClientError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_update.lock().unwrap() = Some(update.clone());

        if let Some(response) = self.update_response.lock().unwrap().take() {
            return response;
        }

        let mut device = self.device.lock().unwrap();
        let params = device.parameters.clone().unwrap_or_default();
        let updated = params
            .with_update(update)
            .map_err(ClientError::ParameterRejected)?;
        device.parameters = Some(updated);
        Ok(device.clone())
    }

    async fn fetch_salt_history(&self) -> Result<Device, ClientError> {
        self.salt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.device())
    }

    async fn fetch_water_history(&self) -> Result<Device, ClientError> {
        self.water_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.device())
    }

    async fn trigger_regeneration(&self) -> Result<(), ClientError> {
        self.regeneration_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn diagnostics(&self) -> Result<serde_json::Value, ClientError> {
        Ok(serde_json::json!({
            "client": "scripted",
            "bound_device": DEVICE_ID,
        }))
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// A fully populated test device
pub fn sample_device() -> Device {
    Device {
        id: DEVICE_ID.to_string(),
        name: "Basement softener".to_string(),
        serial_number: SERIAL.to_string(),
        series: Some("softliQ:SD21".to_string()),
        hardware_version: Some("00000001".to_string()),
        software_version: Some("2.0.4".to_string()),
        parameters: Some(DeviceParameters {
            regeneration_mode: Some(0),
            mode: Some(1),
            raw_water_hardness: Some(21.0),
            soft_water_hardness: Some(6.0),
            maintenance_interval: Some(365.0),
            buzzer: Some(false),
            installer_name: Some("Wasser GmbH".to_string()),
            regeneration_time_monday_1: NaiveTime::from_hms_opt(2, 0, 0),
            ..Default::default()
        }),
        realtime: Some(Realtime {
            raw_water: Some(21.0),
            soft_water: Some(6.0),
            remaining_capacity_percentage: Some(80.0),
            salt_range: Some(60),
            ..Default::default()
        }),
        errors: Vec::new(),
        salt: None,
        water: None,
    }
}

/// `sample_device()` with a different raw water reading
pub fn device_with_raw_water(raw_water: f64) -> Device {
    let mut device = sample_device();
    if let Some(realtime) = device.realtime.as_mut() {
        realtime.raw_water = Some(raw_water);
    }
    device
}

pub fn usage(day: u32, value: f64) -> DailyUsage {
    DailyUsage::new(NaiveDate::from_ymd_opt(2024, 3, day).unwrap(), value)
}

/// Coordinator settings with short timeouts for tests
pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        update_interval_secs: 360,
        refresh_timeout_secs: 5,
        teardown_timeout_secs: 2,
        notification_capacity: 64,
    }
}

/// Build a coordinator around `client` with its own shutdown token
pub fn coordinator_for(client: &Arc<ScriptedClient>) -> (Coordinator, CancellationToken) {
    let shutdown = CancellationToken::new();
    let coordinator = Coordinator::new(
        Arc::clone(client) as Arc<dyn RemoteClient>,
        DEVICE_ID,
        test_config(),
        shutdown.clone(),
    )
    .expect("valid coordinator config");
    (coordinator, shutdown)
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for: {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
