use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Tracks simulator activity for the system-info endpoint
#[derive(Clone)]
pub struct SimulatorMetrics {
    /// Ticks whose body ran to completion (entity-level failures included)
    ticks_completed: Arc<AtomicU64>,

    /// Ticks aborted by an error or panic at the tick boundary
    ticks_failed: Arc<AtomicU64>,

    /// Ticks skipped because the simulator was disabled
    ticks_skipped: Arc<AtomicU64>,

    /// Pit and device readings persisted
    readings_persisted: Arc<AtomicU64>,

    /// Entities skipped because persistence failed
    entity_failures: Arc<AtomicU64>,

    alarms_emitted: Arc<AtomicU64>,

    /// Start of the last completed tick (epoch millis, 0 = never)
    last_tick_at_ms: Arc<AtomicI64>,

    last_tick_duration_ms: Arc<AtomicU64>,
}

impl SimulatorMetrics {
    pub fn new() -> Self {
        Self {
            ticks_completed: Arc::new(AtomicU64::new(0)),
            ticks_failed: Arc::new(AtomicU64::new(0)),
            ticks_skipped: Arc::new(AtomicU64::new(0)),
            readings_persisted: Arc::new(AtomicU64::new(0)),
            entity_failures: Arc::new(AtomicU64::new(0)),
            alarms_emitted: Arc::new(AtomicU64::new(0)),
            last_tick_at_ms: Arc::new(AtomicI64::new(0)),
            last_tick_duration_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a tick that ran to completion
    pub fn record_tick(&self, started_at: DateTime<Utc>, duration_ms: u64) {
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
        self.last_tick_at_ms
            .store(started_at.timestamp_millis(), Ordering::Relaxed);
        self.last_tick_duration_ms
            .store(duration_ms, Ordering::Relaxed);
    }

    pub fn record_tick_failure(&self) {
        self.ticks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading(&self) {
        self.readings_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entity_failure(&self) {
        self.entity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alarm(&self) {
        self.alarms_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed.load(Ordering::Relaxed)
    }

    pub fn ticks_failed(&self) -> u64 {
        self.ticks_failed.load(Ordering::Relaxed)
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped.load(Ordering::Relaxed)
    }

    /// Get snapshot of all counters
    pub fn get_snapshot(&self) -> SimulatorMetricsSnapshot {
        let last_ms = self.last_tick_at_ms.load(Ordering::Relaxed);
        let last_tick_at = if last_ms == 0 {
            None
        } else {
            Utc.timestamp_millis_opt(last_ms).single()
        };

        SimulatorMetricsSnapshot {
            ticks_completed: self.ticks_completed(),
            ticks_failed: self.ticks_failed(),
            ticks_skipped: self.ticks_skipped(),
            readings_persisted: self.readings_persisted.load(Ordering::Relaxed),
            entity_failures: self.entity_failures.load(Ordering::Relaxed),
            alarms_emitted: self.alarms_emitted.load(Ordering::Relaxed),
            last_tick_at,
            last_tick_duration_ms: self.last_tick_duration_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for SimulatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of simulator counters at a point in time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorMetricsSnapshot {
    pub ticks_completed: u64,
    pub ticks_failed: u64,
    pub ticks_skipped: u64,
    pub readings_persisted: u64,
    pub entity_failures: u64,
    pub alarms_emitted: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_tick_duration_ms: u64,
}
