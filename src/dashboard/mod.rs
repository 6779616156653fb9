//! Read models for the dashboard.
//!
//! Live figures come from the snapshot caches written by the simulator.
//! Counts come from the store. When the pit cache is still empty (no tick has
//! run yet) the heatmap is rebuilt from persisted pits and their latest
//! readings instead.

use crate::alarm::AlarmLevel;
use crate::cache::{DeviceCache, DeviceSnapshot, PitCache, PitSnapshot};
use crate::entity::{DeviceStatus, EntityId, PitStatus};
use crate::simulation::{SimulatorMetrics, SimulatorMetricsSnapshot};
use crate::store::Store;
use crate::subscription::Broadcaster;
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Reported when no pit has a cached reading yet
pub const DEFAULT_AVG_TEMPERATURE: f64 = 25.0;
/// Reported when no pit has a cached reading yet
pub const DEFAULT_AVG_HUMIDITY: f64 = 65.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_pits: u64,
    pub normal_pits: u64,
    pub warning_pits: u64,
    pub alarm_pits: u64,
    pub total_devices: u64,
    pub running_devices: u64,
    pub warning_devices: u64,
    pub fault_devices: u64,
    pub active_alarms: u64,
    pub alarms_by_level: HashMap<AlarmLevel, u64>,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub total_power: f64,
}

/// Hourly buckets in the alarm trend
pub const ALARM_TREND_HOURS: usize = 24;

/// Alarms raised during one hour of the trend window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmTrendPoint {
    /// Chart label, "H:00" of the bucket start (UTC)
    pub hour: String,
    pub starts_at: DateTime<Utc>,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub alarm_trend: Vec<AlarmTrendPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMetrics {
    pub temperature: f64,
    pub humidity: f64,
    pub power: f64,
    /// Pits with a cached reading
    pub active_pits: usize,
    pub running_devices: usize,
    pub active_alarms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub ws_connections: usize,
    pub uptime_seconds: u64,
    pub ticks: SimulatorMetricsSnapshot,
    pub cache_entries: CacheEntries,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntries {
    pub pits: usize,
    pub devices: usize,
    pub last_write: Option<DateTime<Utc>>,
}

/// Dashboard queries over the caches, the store and the live subscriber set
pub struct DashboardService {
    store: Arc<dyn Store>,
    pit_cache: Arc<PitCache>,
    device_cache: Arc<DeviceCache>,
    broadcaster: Arc<Broadcaster>,
    simulator_metrics: SimulatorMetrics,
    started_at: Instant,
}

impl DashboardService {
    pub fn new(
        store: Arc<dyn Store>,
        pit_cache: Arc<PitCache>,
        device_cache: Arc<DeviceCache>,
        broadcaster: Arc<Broadcaster>,
        simulator_metrics: SimulatorMetrics,
    ) -> Self {
        Self {
            store,
            pit_cache,
            device_cache,
            broadcaster,
            simulator_metrics,
            started_at: Instant::now(),
        }
    }

    pub fn pit_snapshot(&self, pit_id: EntityId) -> Option<PitSnapshot> {
        self.pit_cache.get(pit_id)
    }

    /// Cached pit snapshots ordered by id
    pub fn pit_snapshots(&self) -> Vec<PitSnapshot> {
        let mut snapshots = self.pit_cache.all();
        snapshots.sort_by_key(|s| s.pit_id);
        snapshots
    }

    pub fn device_snapshot(&self, device_id: EntityId) -> Option<DeviceSnapshot> {
        self.device_cache.get(device_id)
    }

    /// Cached device snapshots ordered by id
    pub fn device_snapshots(&self) -> Vec<DeviceSnapshot> {
        let mut snapshots = self.device_cache.all();
        snapshots.sort_by_key(|s| s.device_id);
        snapshots
    }

    pub fn live_subscriber_count(&self) -> usize {
        self.broadcaster.count()
    }

    pub fn stats(&self) -> Result<DashboardStats> {
        let pits = self.store.pit_status_counts()?;
        let devices = self.store.device_status_counts()?;
        let alarms_by_level = self.store.active_alarm_counts()?;
        let live = self.live_averages();

        let pit_count = |s: PitStatus| pits.get(&s).copied().unwrap_or(0);
        let device_count = |s: DeviceStatus| devices.get(&s).copied().unwrap_or(0);

        Ok(DashboardStats {
            total_pits: pits.values().sum(),
            normal_pits: pit_count(PitStatus::Normal),
            warning_pits: pit_count(PitStatus::Warning),
            alarm_pits: pit_count(PitStatus::Alarm),
            total_devices: devices.values().sum(),
            running_devices: device_count(DeviceStatus::Running),
            warning_devices: device_count(DeviceStatus::Warning),
            fault_devices: device_count(DeviceStatus::Fault),
            active_alarms: alarms_by_level.values().sum(),
            alarms_by_level,
            avg_temperature: live.temperature,
            avg_humidity: live.humidity,
            total_power: live.power,
        })
    }

    /// Heatmap cells ordered by pit id, cache first.
    ///
    /// Falls back to the store when the cache is empty. The fallback does not
    /// populate the cache; only the simulator writes it.
    pub fn heatmap(&self) -> Result<Vec<PitSnapshot>> {
        if !self.pit_cache.is_empty() {
            return Ok(self.pit_snapshots());
        }

        let mut cells = Vec::new();
        for pit in self.store.list_pits()? {
            let latest = self.store.latest_pit_reading(pit.id)?;
            let metrics = latest.as_ref().map(|r| r.metrics);
            cells.push(PitSnapshot {
                pit_id: pit.id,
                pit_no: pit.pit_no,
                zone: pit.zone,
                row: pit.row,
                col: pit.col,
                temperature: metrics.map(|m| m.temperature),
                humidity: metrics.map(|m| m.humidity),
                ph_value: metrics.map(|m| m.ph_value),
                status: pit.status,
                updated_at: latest.map_or(pit.updated_at, |r| r.recorded_at),
            });
        }
        Ok(cells)
    }

    /// Alarm counts for the 24 hours before `now`, oldest bucket first.
    ///
    /// Bucket `i` covers `[now - 24h + i h, now - 24h + (i+1) h)`; every
    /// bucket is present even when empty.
    pub fn alarm_trend(&self, now: DateTime<Utc>) -> Result<Vec<AlarmTrendPoint>> {
        let start = now - ChronoDuration::hours(ALARM_TREND_HOURS as i64);
        let mut counts = [0u64; ALARM_TREND_HOURS];
        for alarm in self.store.alarms_since(start)? {
            let bucket = (alarm.created_at - start).num_hours();
            if let Some(count) = usize::try_from(bucket).ok().and_then(|b| counts.get_mut(b)) {
                *count += 1;
            }
        }

        Ok(counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let starts_at = start + ChronoDuration::hours(i as i64);
                AlarmTrendPoint {
                    hour: format!("{}:00", starts_at.hour()),
                    starts_at,
                    count,
                }
            })
            .collect())
    }

    pub fn overview(&self, now: DateTime<Utc>) -> Result<DashboardOverview> {
        Ok(DashboardOverview {
            alarm_trend: self.alarm_trend(now)?,
        })
    }

    pub fn realtime_metrics(&self) -> Result<RealtimeMetrics> {
        let live = self.live_averages();
        let active_alarms = self.store.active_alarm_counts()?.values().sum();
        let running_devices = self
            .device_cache
            .all()
            .iter()
            .filter(|d| d.status == DeviceStatus::Running)
            .count();

        Ok(RealtimeMetrics {
            temperature: live.temperature,
            humidity: live.humidity,
            power: live.power,
            active_pits: self.pit_cache.len(),
            running_devices,
            active_alarms,
        })
    }

    pub fn system_info(&self) -> SystemInfo {
        let last_write = [self.pit_cache.last_write(), self.device_cache.last_write()]
            .into_iter()
            .flatten()
            .max();

        SystemInfo {
            ws_connections: self.live_subscriber_count(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            ticks: self.simulator_metrics.get_snapshot(),
            cache_entries: CacheEntries {
                pits: self.pit_cache.len(),
                devices: self.device_cache.len(),
                last_write,
            },
        }
    }

    fn live_averages(&self) -> LiveAverages {
        let pits = self.pit_cache.all();
        let temperatures: Vec<f64> = pits.iter().filter_map(|p| p.temperature).collect();
        let humidities: Vec<f64> = pits.iter().filter_map(|p| p.humidity).collect();

        LiveAverages {
            temperature: mean(&temperatures).unwrap_or(DEFAULT_AVG_TEMPERATURE),
            humidity: mean(&humidities).unwrap_or(DEFAULT_AVG_HUMIDITY),
            power: self.device_cache.all().iter().map(|d| d.power).sum(),
        }
    }
}

struct LiveAverages {
    temperature: f64,
    humidity: f64,
    power: f64,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests;
