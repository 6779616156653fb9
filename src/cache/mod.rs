// Aggregation cache: last-known display fields per entity
//
// Written by the simulator, read by dashboard queries. Never the source of
// truth; an empty cache just means no tick has completed yet.

use crate::entity::{DeviceStatus, EntityId, PitStatus};
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};


/// Concurrent entity id -> snapshot map with last-writer-wins upserts
pub struct SnapshotCache<S> {
    /// Lock-free concurrent map for fast reads
    entries: DashMap<EntityId, S>,

    /// Time of the last put (epoch millis, 0 = never written)
    last_write_ms: AtomicI64,
}

impl<S: Clone> SnapshotCache<S> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_write_ms: AtomicI64::new(0),
        }
    }

    /// Overwrite the snapshot for `id`
    pub fn put(&self, id: EntityId, snapshot: S) {
        self.entries.insert(id, snapshot);
        self.last_write_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn get(&self, id: EntityId) -> Option<S> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// All current snapshots, in no particular order
    pub fn all(&self) -> Vec<S> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_write(&self) -> Option<DateTime<Utc>> {
        match self.last_write_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }
}

impl<S: Clone> Default for SnapshotCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Heatmap cell for one pit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitSnapshot {
    pub pit_id: EntityId,
    pub pit_no: String,
    pub zone: String,
    pub row: u32,
    pub col: u32,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub ph_value: Option<f64>,
    pub status: PitStatus,
    pub updated_at: DateTime<Utc>,
}

/// Last-known operating state of one device
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub device_id: EntityId,
    pub device_no: String,
    pub name: String,
    pub device_type: String,
    pub power: f64,
    pub temperature: f64,
    pub vibration: f64,
    pub speed: f64,
    pub current: f64,
    pub status: DeviceStatus,
    pub running_hours: f64,
    pub updated_at: DateTime<Utc>,
}

pub type PitCache = SnapshotCache<PitSnapshot>;
pub type DeviceCache = SnapshotCache<DeviceSnapshot>;
