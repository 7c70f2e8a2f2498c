// # Simulated Cloud Client
//
// In-process stand-in for the vendor cloud: one account, one softener.
//
// ## Behavior
//
// - ✅ Login accepts any non-empty credentials
// - ✅ Pulls return the full device state (settings + realtime)
// - ✅ The push channel emits an evolving snapshot every `push_interval_secs`
// - ✅ Parameter writes are validated and answered with the confirmed state
// - ✅ Salt and water histories cover the last 30 days
// - ❌ NO scheduling or reconnection (owned by the Coordinator)
// - ❌ NO background tasks: pushes are produced inside `listen()`
//
// ## Simulation
//
// Every push advances the device one step: water flows, capacity drains,
// and an automatic regeneration refills the capacity once it is used up.
// The sequence is deterministic so the daemon's log output is reproducible.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use softener_core::config::{ClientConfig, Credentials};
use softener_core::model::{DailyUsage, DeviceParameters, Realtime};
use softener_core::{
    ClientError, ClientRegistry, Device, DeviceSummary, Error, ParameterUpdate, PushCallback,
    RemoteClient, RemoteClientFactory, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Parameters the service refuses to change
const READ_ONLY_PARAMETERS: &[&str] = &["maximum_remaining_time_regeneration"];

/// Days of history kept per series
const HISTORY_DAYS: i64 = 30;

/// Flow pattern cycled through by the simulation [m³/h]
const FLOW_PATTERN: [f64; 6] = [0.0, 0.0, 0.42, 0.85, 0.3, 0.0];

/// Simulated cloud client
pub struct SimulatedClient {
    credentials_valid: bool,
    push_interval: Duration,
    state: Mutex<SimState>,
    bound: AtomicBool,
    channel: watch::Sender<bool>,
}

struct SimState {
    device: Device,
    tick: u64,
    salt: Vec<DailyUsage>,
    water: Vec<DailyUsage>,
}

impl SimulatedClient {
    /// Create a simulated account holding one device
    ///
    /// # Parameters
    ///
    /// - `credentials`: Account credentials; empty ones are refused at login
    /// - `serial_number`: Serial number of the simulated softener
    /// - `push_interval`: Time between two pushed snapshots
    pub fn new(credentials: &Credentials, serial_number: &str, push_interval: Duration) -> Self {
        let today = Utc::now().date_naive();
        let (channel, _) = watch::channel(false);

        Self {
            credentials_valid: !credentials.username.is_empty() && !credentials.password.is_empty(),
            push_interval,
            state: Mutex::new(SimState {
                device: initial_device(serial_number, today),
                tick: 0,
                salt: history(today, |day| if day % 4 == 0 { 0.4 } else { 0.0 }),
                water: history(today, |day| 80.0 + f64::from((day * 37) % 60)),
            }),
            bound: AtomicBool::new(false),
            channel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_bound(&self) -> std::result::Result<(), ClientError> {
        if self.bound.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::NotBound)
        }
    }

    fn snapshot(&self) -> Device {
        self.lock().device.clone()
    }

    /// Advance the simulation one step and return the new state
    fn advance(&self) -> Device {
        let mut state = self.lock();
        state.tick += 1;
        let tick = state.tick;
        let interval_hours = self.push_interval.as_secs_f64() / 3600.0;

        let device = &mut state.device;
        let realtime = device.realtime.get_or_insert_with(Realtime::default);

        let flow = FLOW_PATTERN[(tick % FLOW_PATTERN.len() as u64) as usize];
        let produced_m3 = flow * interval_hours;
        realtime.current_flow_rate = Some(flow);
        realtime.soft_water_quantity =
            Some(realtime.soft_water_quantity.unwrap_or(0.0) + produced_m3 * 1000.0);

        let capacity = (realtime.remaining_capacity_volume.unwrap_or(0.0) - produced_m3).max(0.0);
        realtime.remaining_capacity_volume = Some(round2(capacity));
        realtime.remaining_capacity_percentage = Some(round2(capacity / FULL_CAPACITY_M3 * 100.0));

        if capacity <= 0.0 {
            regenerate(realtime);
            debug!(tick, "simulated automatic regeneration");
        }

        device.clone()
    }
}

/// Capacity of a fully regenerated resin bed [m³]
const FULL_CAPACITY_M3: f64 = 2.5;

fn regenerate(realtime: &mut Realtime) {
    realtime.remaining_capacity_volume = Some(FULL_CAPACITY_M3);
    realtime.remaining_capacity_percentage = Some(100.0);
    realtime.regeneration_counter = Some(realtime.regeneration_counter.unwrap_or(0) + 1);
    realtime.salt_consumption = Some(round2(realtime.salt_consumption.unwrap_or(0.0) + 0.4));
    realtime.salt_range = Some(realtime.salt_range.unwrap_or(1).saturating_sub(1).max(1));
    realtime.next_regeneration = Some(Utc::now() + ChronoDuration::days(3));
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn history(today: NaiveDate, value: impl Fn(u32) -> f64) -> Vec<DailyUsage> {
    (0..HISTORY_DAYS)
        .rev()
        .map(|days_ago| {
            let date = today - ChronoDuration::days(days_ago);
            DailyUsage::new(date, value(days_ago as u32))
        })
        .collect()
}

fn initial_device(serial_number: &str, today: NaiveDate) -> Device {
    let two_am = NaiveTime::from_hms_opt(2, 0, 0);

    Device {
        id: format!("softliQ.D/{}", serial_number),
        name: format!("softliQ {}", serial_number),
        serial_number: serial_number.to_string(),
        series: Some("softliQ:SD21".to_string()),
        hardware_version: Some("00000001".to_string()),
        software_version: Some("2.0.4".to_string()),
        parameters: Some(DeviceParameters {
            regeneration_mode: Some(0),
            water_hardness_unit: Some(1),
            language: Some(0),
            mode: Some(1),
            led_ring_mode: Some(1),
            raw_water_hardness: Some(21.0),
            soft_water_hardness: Some(6.0),
            maintenance_interval: Some(365.0),
            led_ring_brightness: Some(80.0),
            residual_capacity_limit: Some(20.0),
            nominal_flow_rate: Some(1.8),
            dlst: Some(true),
            buzzer: Some(false),
            push_notification: Some(true),
            email_notification: Some(false),
            ntp_sync: Some(true),
            regeneration_time_monday_1: two_am,
            regeneration_time_thursday_1: two_am,
            ..Default::default()
        }),
        realtime: Some(Realtime {
            next_regeneration: Some(Utc::now() + ChronoDuration::days(2)),
            startup: today.checked_sub_signed(ChronoDuration::days(400)),
            last_service: today.checked_sub_signed(ChronoDuration::days(120)),
            raw_water: Some(21.0),
            soft_water: Some(6.0),
            soft_water_quantity: Some(184_320.0),
            regeneration_counter: Some(412),
            current_flow_rate: Some(0.0),
            remaining_capacity_volume: Some(1.6),
            remaining_capacity_percentage: Some(64.0),
            salt_range: Some(75),
            salt_consumption: Some(164.8),
            next_service: Some(245),
        }),
        errors: Vec::new(),
        salt: None,
        water: None,
    }
}

#[async_trait]
impl RemoteClient for SimulatedClient {
    async fn login(&self) -> std::result::Result<bool, ClientError> {
        Ok(self.credentials_valid)
    }

    async fn list_devices(&self) -> std::result::Result<Vec<DeviceSummary>, ClientError> {
        Ok(vec![DeviceSummary::from(&self.snapshot())])
    }

    async fn bind(&self, device_id: &str) -> std::result::Result<(), ClientError> {
        if !self.credentials_valid {
            return Err(ClientError::Authentication("invalid credentials".to_string()));
        }
        if self.lock().device.id != device_id {
            return Err(ClientError::DeviceNotFound(device_id.to_string()));
        }
        self.bound.store(true, Ordering::SeqCst);
        info!(device_id, "simulated client bound");
        Ok(())
    }

    async fn pull_settings(&self) -> std::result::Result<Device, ClientError> {
        self.ensure_bound()?;
        Ok(self.snapshot())
    }

    async fn pull_realtime_parameters(&self) -> std::result::Result<Device, ClientError> {
        self.ensure_bound()?;
        Ok(self.snapshot())
    }

    async fn open_channel(&self) -> std::result::Result<(), ClientError> {
        self.ensure_bound()?;
        self.channel.send_replace(true);
        debug!("simulated push channel opened");
        Ok(())
    }

    async fn listen(&self, on_message: PushCallback) -> std::result::Result<(), ClientError> {
        let mut open = self.channel.subscribe();
        let start = tokio::time::Instant::now() + self.push_interval;
        let mut ticker = tokio::time::interval_at(start, self.push_interval);

        loop {
            if !*open.borrow_and_update() {
                return Ok(());
            }

            tokio::select! {
                changed = open.changed() => {
                    if changed.is_err() {
                        return Err(ClientError::channel_closed("simulated service went away"));
                    }
                }
                _ = ticker.tick() => on_message(self.advance()),
            }
        }
    }

    async fn close_channel(&self) -> std::result::Result<(), ClientError> {
        if self.channel.send_replace(false) {
            debug!("simulated push channel closed");
        }
        Ok(())
    }

    async fn keep_alive(&self) -> std::result::Result<(), ClientError> {
        if !*self.channel.borrow() {
            return Err(ClientError::channel("no push channel open"));
        }
        Ok(())
    }

    async fn update_parameters(
        &self,
        update: &ParameterUpdate,
    ) -> std::result::Result<Device, ClientError> {
        self.ensure_bound()?;

        if let Some(key) = update.keys().find(|key| READ_ONLY_PARAMETERS.contains(key)) {
            return Err(ClientError::rejected(format!("parameter '{}' is read-only", key)));
        }

        let mut state = self.lock();
        let params = state.device.parameters.clone().unwrap_or_default();
        let updated = params.with_update(update).map_err(ClientError::rejected)?;
        state.device.parameters = Some(updated);

        info!(parameters = ?update.keys().collect::<Vec<_>>(), "simulated parameters updated");
        Ok(state.device.clone())
    }

    async fn fetch_salt_history(&self) -> std::result::Result<Device, ClientError> {
        self.ensure_bound()?;
        let state = self.lock();
        let mut device = state.device.clone();
        device.salt = Some(state.salt.clone());
        Ok(device)
    }

    async fn fetch_water_history(&self) -> std::result::Result<Device, ClientError> {
        self.ensure_bound()?;
        let state = self.lock();
        let mut device = state.device.clone();
        device.water = Some(state.water.clone());
        Ok(device)
    }

    async fn trigger_regeneration(&self) -> std::result::Result<(), ClientError> {
        self.ensure_bound()?;
        let mut state = self.lock();
        if let Some(realtime) = state.device.realtime.as_mut() {
            regenerate(realtime);
        }
        info!("simulated manual regeneration");
        Ok(())
    }

    async fn diagnostics(&self) -> std::result::Result<serde_json::Value, ClientError> {
        let state = self.lock();
        Ok(serde_json::json!({
            "client": "simulated",
            "bound": self.bound.load(Ordering::SeqCst),
            "channel_open": *self.channel.borrow(),
            "push_interval_secs": self.push_interval.as_secs(),
            "tick": state.tick,
            "device": state.device,
        }))
    }

    fn client_name(&self) -> &'static str {
        "simulated"
    }
}

/// Factory for creating simulated clients
pub struct SimulatedClientFactory;

impl RemoteClientFactory for SimulatedClientFactory {
    fn create(
        &self,
        config: &ClientConfig,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteClient>> {
        match config {
            ClientConfig::Simulated {
                serial_number,
                push_interval_secs,
            } => {
                if serial_number.is_empty() {
                    return Err(Error::config("Simulated client serial number is required"));
                }
                if *push_interval_secs == 0 {
                    return Err(Error::config("Simulated client push interval must be > 0"));
                }
                Ok(Arc::new(SimulatedClient::new(
                    credentials,
                    serial_number,
                    Duration::from_secs(*push_interval_secs),
                )))
            }
            _ => Err(Error::config("Invalid config for simulated client")),
        }
    }
}

/// Register the simulated client with a registry
pub fn register(registry: &ClientRegistry) {
    registry.register_client("simulated", Box::new(SimulatedClientFactory));
}
