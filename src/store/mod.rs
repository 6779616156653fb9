//! Persistence collaborator for the simulator and the dashboard.
//!
//! The simulator only ever talks to storage through [`Store`]; entity CRUD
//! beyond what seeding needs lives elsewhere.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: process-local, used for demos without a database and in tests
//! - [`SqliteStore`]: durable, backed by `rusqlite`

use crate::alarm::{Alarm, AlarmLevel, NewAlarm};
use crate::entity::{Device, DeviceStatus, EntityId, NewDevice, NewPit, Pit, PitStatus};
use crate::reading::{DeviceReading, PitReading};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

mod memory;
pub mod seed;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Everything one tick writes for a pit
#[derive(Debug, Clone, PartialEq)]
pub struct PitUpdate {
    pub reading: PitReading,
    /// Set only when the status changed this tick
    pub status: Option<PitStatus>,
    /// Stamp for `updated_at` when the status is written
    pub at: DateTime<Utc>,
}

/// Everything one tick writes for a device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub reading: DeviceReading,
    /// Set only when the status changed this tick
    pub status: Option<DeviceStatus>,
    /// Added to the running-hours counter
    pub running_hours: f64,
    pub at: DateTime<Utc>,
}

/// Storage operations consumed by the simulator and dashboard.
///
/// Implementations must be safe to call from multiple threads. The
/// `apply_*_update` methods are all-or-nothing: on error none of the
/// reading, status or running-hours writes are visible.
pub trait Store: Send + Sync {
    /// All pits, ordered by id
    fn list_pits(&self) -> Result<Vec<Pit>>;

    /// All devices, ordered by id
    fn list_devices(&self) -> Result<Vec<Device>>;

    /// Most recent reading for a pit, if any
    fn latest_pit_reading(&self, pit_id: EntityId) -> Result<Option<PitReading>>;

    /// Most recent reading for a device, if any
    fn latest_device_reading(&self, device_id: EntityId) -> Result<Option<DeviceReading>>;

    /// Append a reading without touching the entity itself
    fn save_pit_reading(&self, reading: &PitReading) -> Result<()>;

    fn save_device_reading(&self, reading: &DeviceReading) -> Result<()>;

    /// Save a pit's reading and, if set, its new status as one unit
    fn apply_pit_update(&self, update: &PitUpdate) -> Result<()>;

    /// Save a device's reading, status change and running hours as one unit.
    /// Returns the new running-hours total.
    fn apply_device_update(&self, update: &DeviceUpdate) -> Result<f64>;

    /// Persist an alarm and return it with its assigned id
    fn save_alarm(&self, alarm: &NewAlarm) -> Result<Alarm>;

    fn pit_status_counts(&self) -> Result<HashMap<PitStatus, u64>>;

    fn device_status_counts(&self) -> Result<HashMap<DeviceStatus, u64>>;

    /// Active alarms grouped by level
    fn active_alarm_counts(&self) -> Result<HashMap<AlarmLevel, u64>>;

    /// Alarms created at or after `since`, oldest first
    fn alarms_since(&self, since: DateTime<Utc>) -> Result<Vec<Alarm>>;

    fn insert_pit(&self, pit: &NewPit) -> Result<Pit>;

    fn insert_device(&self, device: &NewDevice) -> Result<Device>;
}
