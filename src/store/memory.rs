use super::{DeviceUpdate, PitUpdate, Store};
use crate::alarm::{Alarm, AlarmLevel, AlarmStatus, NewAlarm};
use crate::entity::{Device, DeviceStatus, EntityId, NewDevice, NewPit, Pit, PitStatus};
use crate::reading::{DeviceReading, PitReading};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Readings kept per entity before the oldest are dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 720;

/// In-process store. Contents are lost on restart.
///
/// Only the newest readings of each entity are retained, so memory stays
/// flat however long the simulator runs.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    history_limit: usize,
}

#[derive(Default)]
struct Inner {
    pits: BTreeMap<EntityId, Pit>,
    devices: BTreeMap<EntityId, Device>,
    pit_readings: HashMap<EntityId, VecDeque<PitReading>>,
    device_readings: HashMap<EntityId, VecDeque<DeviceReading>>,
    alarms: Vec<Alarm>,
    last_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

fn push_bounded<T>(history: &mut VecDeque<T>, item: T, limit: usize) {
    history.push_back(item);
    while history.len() > limit {
        history.pop_front();
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Keep at most `limit` readings per entity (at least one)
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            history_limit: limit.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every write leaves Inner consistent, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Retained readings for a pit, oldest first
    pub fn pit_readings(&self, pit_id: EntityId) -> Vec<PitReading> {
        self.lock()
            .pit_readings
            .get(&pit_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Retained readings for a device, oldest first
    pub fn device_readings(&self, device_id: EntityId) -> Vec<DeviceReading> {
        self.lock()
            .device_readings
            .get(&device_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.lock().alarms.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn list_pits(&self) -> Result<Vec<Pit>> {
        Ok(self.lock().pits.values().cloned().collect())
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.lock().devices.values().cloned().collect())
    }

    fn latest_pit_reading(&self, pit_id: EntityId) -> Result<Option<PitReading>> {
        Ok(self
            .lock()
            .pit_readings
            .get(&pit_id)
            .and_then(|readings| readings.back().cloned()))
    }

    fn latest_device_reading(&self, device_id: EntityId) -> Result<Option<DeviceReading>> {
        Ok(self
            .lock()
            .device_readings
            .get(&device_id)
            .and_then(|readings| readings.back().cloned()))
    }

    fn save_pit_reading(&self, reading: &PitReading) -> Result<()> {
        let mut inner = self.lock();
        let history = inner.pit_readings.entry(reading.pit_id).or_default();
        push_bounded(history, reading.clone(), self.history_limit);
        Ok(())
    }

    fn save_device_reading(&self, reading: &DeviceReading) -> Result<()> {
        let mut inner = self.lock();
        let history = inner.device_readings.entry(reading.device_id).or_default();
        push_bounded(history, reading.clone(), self.history_limit);
        Ok(())
    }

    fn apply_pit_update(&self, update: &PitUpdate) -> Result<()> {
        let pit_id = update.reading.pit_id;
        let mut inner = self.lock();
        // Fail before the first write so a missing pit leaves nothing behind
        let pit = inner
            .pits
            .get_mut(&pit_id)
            .ok_or_else(|| anyhow!("pit {} not found", pit_id))?;
        if let Some(status) = update.status {
            pit.status = status;
            pit.updated_at = update.at;
        }
        let history = inner.pit_readings.entry(pit_id).or_default();
        push_bounded(history, update.reading.clone(), self.history_limit);
        Ok(())
    }

    fn apply_device_update(&self, update: &DeviceUpdate) -> Result<f64> {
        let device_id = update.reading.device_id;
        let mut inner = self.lock();
        let device = inner
            .devices
            .get_mut(&device_id)
            .ok_or_else(|| anyhow!("device {} not found", device_id))?;
        if let Some(status) = update.status {
            device.status = status;
            device.updated_at = update.at;
        }
        device.running_hours += update.running_hours;
        let running_hours = device.running_hours;
        let history = inner.device_readings.entry(device_id).or_default();
        push_bounded(history, update.reading.clone(), self.history_limit);
        Ok(running_hours)
    }

    fn save_alarm(&self, alarm: &NewAlarm) -> Result<Alarm> {
        let mut inner = self.lock();
        let id = inner.next_id();
        let saved = alarm.clone().into_alarm(id);
        inner.alarms.push(saved.clone());
        Ok(saved)
    }

    fn pit_status_counts(&self) -> Result<HashMap<PitStatus, u64>> {
        let mut counts = HashMap::new();
        for pit in self.lock().pits.values() {
            *counts.entry(pit.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn device_status_counts(&self) -> Result<HashMap<DeviceStatus, u64>> {
        let mut counts = HashMap::new();
        for device in self.lock().devices.values() {
            *counts.entry(device.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn active_alarm_counts(&self) -> Result<HashMap<AlarmLevel, u64>> {
        let mut counts = HashMap::new();
        for alarm in self
            .lock()
            .alarms
            .iter()
            .filter(|a| a.status == AlarmStatus::Active)
        {
            *counts.entry(alarm.level).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn alarms_since(&self, since: DateTime<Utc>) -> Result<Vec<Alarm>> {
        let mut alarms: Vec<Alarm> = self
            .lock()
            .alarms
            .iter()
            .filter(|a| a.created_at >= since)
            .cloned()
            .collect();
        alarms.sort_by_key(|a| (a.created_at, a.id));
        Ok(alarms)
    }

    fn insert_pit(&self, pit: &NewPit) -> Result<Pit> {
        let mut inner = self.lock();
        if inner.pits.values().any(|p| p.pit_no == pit.pit_no) {
            return Err(anyhow!("pit '{}' already exists", pit.pit_no));
        }

        let now = Utc::now();
        let id = inner.next_id();
        let created = Pit {
            id,
            pit_no: pit.pit_no.clone(),
            zone: pit.zone.clone(),
            row: pit.row,
            col: pit.col,
            status: pit.status,
            pit_age: pit.pit_age,
            fermentation_day: pit.fermentation_day,
            grain_type: pit.grain_type.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.pits.insert(id, created.clone());
        Ok(created)
    }

    fn insert_device(&self, device: &NewDevice) -> Result<Device> {
        let mut inner = self.lock();
        if inner.devices.values().any(|d| d.device_no == device.device_no) {
            return Err(anyhow!("device '{}' already exists", device.device_no));
        }

        let now = Utc::now();
        let id = inner.next_id();
        let created = Device {
            id,
            device_no: device.device_no.clone(),
            name: device.name.clone(),
            device_type: device.device_type.clone(),
            location: device.location.clone(),
            status: device.status,
            running_hours: device.running_hours,
            created_at: now,
            updated_at: now,
        };
        inner.devices.insert(id, created.clone());
        Ok(created)
    }
}
