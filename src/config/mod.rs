pub mod runtime;
pub use runtime::{new_runtime_config, RuntimeConfig, SharedRuntimeConfig};

use crate::simulation::walk::WalkParams;
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Complete brewtwin configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrewConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// HTTP / WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Frames queued per subscriber before it is dropped as slow
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Upper bound on a single WebSocket send (milliseconds)
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_send_timeout_ms() -> u64 {
    2_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            subscriber_buffer: default_subscriber_buffer(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_alarm_probability")]
    pub alarm_probability: f64,
    #[serde(default)]
    pub walk: WalkConfig,
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_alarm_probability() -> f64 {
    0.05
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_interval_ms(),
            alarm_probability: default_alarm_probability(),
            walk: WalkConfig::default(),
        }
    }
}

/// Random walk parameters for every simulated metric
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalkConfig {
    #[serde(default)]
    pub pit: PitWalk,
    #[serde(default)]
    pub device: DeviceWalk,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PitWalk {
    #[serde(default = "default_pit_temperature")]
    pub temperature: WalkParams,
    #[serde(default = "default_pit_humidity")]
    pub humidity: WalkParams,
    #[serde(default = "default_pit_ph_value")]
    pub ph_value: WalkParams,
    #[serde(default = "default_pit_acidity")]
    pub acidity: WalkParams,
    #[serde(default = "default_pit_moisture")]
    pub moisture: WalkParams,
    #[serde(default = "default_pit_alcohol")]
    pub alcohol: WalkParams,
}

fn default_pit_temperature() -> WalkParams {
    WalkParams::new(1.0, 15.0, 45.0, 25.0)
}

fn default_pit_humidity() -> WalkParams {
    WalkParams::new(2.0, 40.0, 95.0, 70.0)
}

fn default_pit_ph_value() -> WalkParams {
    WalkParams::new(0.1, 3.0, 6.0, 4.5)
}

fn default_pit_acidity() -> WalkParams {
    WalkParams::new(0.05, 0.2, 2.0, 1.0)
}

fn default_pit_moisture() -> WalkParams {
    WalkParams::new(1.0, 40.0, 70.0, 55.0)
}

fn default_pit_alcohol() -> WalkParams {
    WalkParams::new(0.2, 0.0, 20.0, 5.0)
}

impl Default for PitWalk {
    fn default() -> Self {
        Self {
            temperature: default_pit_temperature(),
            humidity: default_pit_humidity(),
            ph_value: default_pit_ph_value(),
            acidity: default_pit_acidity(),
            moisture: default_pit_moisture(),
            alcohol: default_pit_alcohol(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceWalk {
    #[serde(default = "default_device_power")]
    pub power: WalkParams,
    #[serde(default = "default_device_current")]
    pub current: WalkParams,
    #[serde(default = "default_device_temperature")]
    pub temperature: WalkParams,
    #[serde(default = "default_device_vibration")]
    pub vibration: WalkParams,
    #[serde(default = "default_device_speed")]
    pub speed: WalkParams,
    /// Extra vibration drift applied while a device is in `warning`
    #[serde(default = "default_warning_vibration_drift")]
    pub warning_vibration_drift: f64,
}

fn default_device_power() -> WalkParams {
    WalkParams::new(0.5, 0.0, 100.0, 15.0)
}

fn default_device_current() -> WalkParams {
    WalkParams::new(0.2, 0.0, 50.0, 5.0)
}

fn default_device_temperature() -> WalkParams {
    WalkParams::new(1.0, 20.0, 100.0, 45.0).with_drift(0.1)
}

fn default_device_vibration() -> WalkParams {
    WalkParams::new(1.0, 0.0, 10.0, 1.0)
}

fn default_device_speed() -> WalkParams {
    WalkParams::new(10.0, 0.0, 3000.0, 1400.0)
}

fn default_warning_vibration_drift() -> f64 {
    0.2
}

impl Default for DeviceWalk {
    fn default() -> Self {
        Self {
            power: default_device_power(),
            current: default_device_current(),
            temperature: default_device_temperature(),
            vibration: default_device_vibration(),
            speed: default_device_speed(),
            warning_vibration_drift: default_warning_vibration_drift(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_sqlite_path() -> String {
    "brewtwin.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

/// Demo data created on first start against an empty store
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_total_pits")]
    pub total_pits: usize,
    #[serde(default = "default_total_devices")]
    pub total_devices: usize,
}

fn default_total_pits() -> usize {
    100
}

fn default_total_devices() -> usize {
    50
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            total_pits: default_total_pits(),
            total_devices: default_total_devices(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BrewConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: BrewConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

impl BrewConfig {
    /// Check values that deserialize fine but would break the simulator
    pub fn validate(&self) -> Result<()> {
        self.simulator.validate()
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.alarm_probability),
            "simulator.alarm_probability must be within [0, 1], got {}",
            self.alarm_probability
        );
        self.walk.validate()
    }
}

impl WalkConfig {
    pub fn validate(&self) -> Result<()> {
        let pit = &self.pit;
        let device = &self.device;
        let metrics = [
            ("pit.temperature", &pit.temperature),
            ("pit.humidity", &pit.humidity),
            ("pit.ph_value", &pit.ph_value),
            ("pit.acidity", &pit.acidity),
            ("pit.moisture", &pit.moisture),
            ("pit.alcohol", &pit.alcohol),
            ("device.power", &device.power),
            ("device.current", &device.current),
            ("device.temperature", &device.temperature),
            ("device.vibration", &device.vibration),
            ("device.speed", &device.speed),
        ];
        for (name, params) in metrics {
            params.validate(&format!("simulator.walk.{}", name))?;
        }
        ensure!(
            device.warning_vibration_drift.is_finite(),
            "simulator.walk.device.warning_vibration_drift must be finite"
        );
        Ok(())
    }
}
