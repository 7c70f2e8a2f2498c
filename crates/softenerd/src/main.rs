// # softenerd - Water Softener Daemon
//
// Thin host for one refresh coordinator. All scheduling, push-channel and
// state logic lives in softener-core; this binary only wires it up.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering remote clients and discovering the device
// 4. Running the coordinator until SIGTERM/SIGINT, then unloading it
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Account
// - `SOFTENER_USERNAME`: Cloud account user name (required)
// - `SOFTENER_PASSWORD`: Cloud account password (required)
// - `SOFTENER_DEVICE_ID`: Device to coordinate (optional, first device otherwise)
//
// ### Client
// - `SOFTENER_CLIENT_TYPE`: Remote client type (simulated)
// - `SOFTENER_SERIAL_NUMBER`: Serial number of the simulated device
// - `SOFTENER_PUSH_INTERVAL_SECS`: Seconds between simulated push messages
//
// ### Coordinator
// - `SOFTENER_UPDATE_INTERVAL_SECS`: Scheduled refresh period
//
// ### Logging
// - `SOFTENER_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export SOFTENER_USERNAME=user@example.org
// export SOFTENER_PASSWORD=secret
// export SOFTENER_CLIENT_TYPE=simulated
// export SOFTENER_PUSH_INTERVAL_SECS=10
//
// softenerd
// ```

use anyhow::{Context, Result};
use softener_core::config::{ClientConfig, Credentials, SoftenerConfig};
use softener_core::setup::{discover_devices, select_device};
use softener_core::{ClientRegistry, Coordinator, EntitySet};
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// First delay before retrying a device that is not ready
const NOT_READY_RETRY: Duration = Duration::from_secs(15);

/// Upper bound for the not-ready retry delay
const NOT_READY_RETRY_MAX: Duration = Duration::from_secs(300);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SoftenerExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SoftenerExitCode> for ExitCode {
    fn from(code: SoftenerExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    client_type: String,
    username: String,
    password: String,
    device_id: Option<String>,
    serial_number: Option<String>,
    update_interval_secs: Option<u64>,
    push_interval_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            client_type: env::var("SOFTENER_CLIENT_TYPE")
                .unwrap_or_else(|_| "simulated".to_string()),
            username: env::var("SOFTENER_USERNAME").context("SOFTENER_USERNAME is not set")?,
            password: env::var("SOFTENER_PASSWORD").context("SOFTENER_PASSWORD is not set")?,
            device_id: env::var("SOFTENER_DEVICE_ID").ok(),
            serial_number: env::var("SOFTENER_SERIAL_NUMBER").ok(),
            update_interval_secs: parse_var("SOFTENER_UPDATE_INTERVAL_SECS")?,
            push_interval_secs: parse_var("SOFTENER_PUSH_INTERVAL_SECS")?,
            log_level: env::var("SOFTENER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            anyhow::bail!(
                "SOFTENER_USERNAME is required. \
                Set it via: export SOFTENER_USERNAME=user@example.org"
            );
        }

        if self.password.is_empty() {
            anyhow::bail!("SOFTENER_PASSWORD is required");
        }

        match self.client_type.as_str() {
            "simulated" => {}
            _ => anyhow::bail!(
                "SOFTENER_CLIENT_TYPE '{}' is not supported. \
                Supported types: simulated",
                self.client_type
            ),
        }

        if let Some(interval) = self.update_interval_secs
            && !(30..=86_400).contains(&interval)
        {
            anyhow::bail!(
                "SOFTENER_UPDATE_INTERVAL_SECS must be between 30 and 86400 seconds. Got: {}",
                interval
            );
        }

        if let Some(interval) = self.push_interval_secs
            && !(1..=3600).contains(&interval)
        {
            anyhow::bail!(
                "SOFTENER_PUSH_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                interval
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SOFTENER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_softener_config().validate()?;
        Ok(())
    }

    /// Build the library configuration, keeping library defaults for unset values
    fn to_softener_config(&self) -> SoftenerConfig {
        let mut config = SoftenerConfig::new(Credentials::new(&self.username, &self.password));
        config.device_id = self.device_id.clone();

        if let ClientConfig::Simulated {
            serial_number,
            push_interval_secs,
        } = &mut config.client
        {
            if let Some(serial) = &self.serial_number {
                *serial_number = serial.clone();
            }
            if let Some(interval) = self.push_interval_secs {
                *push_interval_secs = interval;
            }
        }

        if let Some(interval) = self.update_interval_secs {
            config.coordinator.update_interval_secs = interval;
        }

        config
    }
}

fn parse_var(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a number of seconds. Got: {}", name, value)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SoftenerExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SoftenerExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SoftenerExitCode::ConfigError.into();
    }

    info!("Starting softenerd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SoftenerExitCode::RuntimeError.into();
        }
    };

    let settings = config.to_softener_config();
    let result = rt.block_on(async {
        if let Err(e) = run_daemon(settings).await {
            error!("Daemon error: {:#}", e);
            SoftenerExitCode::RuntimeError
        } else {
            SoftenerExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(settings: SoftenerConfig) -> Result<()> {
    let registry = ClientRegistry::new();

    #[cfg(feature = "simulated")]
    {
        info!("Registering simulated client");
        softener_client_sim::register(&registry);
    }

    let client = registry.create_client(&settings.client, &settings.credentials)?;
    info!(client = client.client_name(), "Remote client created");

    let devices = discover_devices(client.as_ref())
        .await
        .context("Device discovery failed")?;
    let device = select_device(&devices, settings.device_id.as_deref())?.clone();
    info!(device_id = %device.id, name = %device.name, "Device selected");

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let result = wait_for_shutdown().await;
            shutdown.cancel();
            result
        }
    });

    let coordinator = Coordinator::new(
        client,
        device.id.clone(),
        settings.coordinator.clone(),
        shutdown.clone(),
    )?;

    if wait_until_ready(&coordinator, &shutdown).await {
        serve(&coordinator, &shutdown).await?;
    } else {
        info!("Shutdown requested before the device became ready");
    }

    coordinator.unload().await;

    match signals.await {
        Ok(Ok(signal)) => {
            info!("Received shutdown signal: {}", signal);
            info!("Daemon stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(e) => Err(anyhow::anyhow!("Signal task failed: {}", e)),
    }
}

/// Retry the first refresh until it succeeds or shutdown is requested
///
/// Returns `false` when shutdown came first.
async fn wait_until_ready(coordinator: &Coordinator, shutdown: &CancellationToken) -> bool {
    let mut delay = NOT_READY_RETRY;

    loop {
        match coordinator.first_refresh().await {
            Ok(device) => {
                info!(serial_number = %device.serial_number, "Device ready");
                return true;
            }
            Err(e) => warn!("{}; retrying in {:?}", e, delay),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(NOT_READY_RETRY_MAX);
    }
}

/// Drive the coordinator and log entity states until shutdown
async fn serve(coordinator: &Coordinator, shutdown: &CancellationToken) -> Result<()> {
    let entities = EntitySet::from_coordinator(coordinator)
        .context("No device snapshot after the first refresh")?;
    info!(count = entities.len(), "Entities created");

    let listener = tokio::spawn(log_updates(
        entities,
        coordinator.clone(),
        shutdown.clone(),
    ));

    let runner = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run().await }
    });

    info!(
        interval = ?coordinator.config().update_interval(),
        "Coordinator running"
    );
    shutdown.cancelled().await;
    info!("Shutting down");

    let teardown = coordinator.config().teardown_timeout();
    if !join_or_abort(runner, teardown).await {
        warn!("Refresh loop did not stop within {:?}, aborted", teardown);
    }
    if let Err(e) = listener.await {
        warn!("Update listener failed: {}", e);
    }

    Ok(())
}

/// Wait for `task` up to `timeout`, aborting it when it does not finish
///
/// Returns `false` if the task had to be aborted.
async fn join_or_abort<T>(mut task: JoinHandle<T>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(_) => true,
        Err(_) => {
            task.abort();
            false
        }
    }
}

/// Log every coordinator update together with the resulting entity states
async fn log_updates(entities: EntitySet, coordinator: Coordinator, shutdown: CancellationToken) {
    let mut updates = coordinator.update_stream();

    loop {
        let update = tokio::select! {
            _ = shutdown.cancelled() => break,
            update = updates.next() => update,
        };

        match update {
            Some(Ok(update)) => {
                info!(
                    source = ?update.source,
                    success = update.last_update_success,
                    "Device state updated"
                );
                for (unique_id, state) in entities.states() {
                    match state {
                        Some(value) => debug!("{} = {}", unique_id, value),
                        None => debug!("{} = unknown", unique_id),
                    }
                }
            }
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                warn!(skipped, "Update listener fell behind");
            }
            None => break,
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
