use super::metrics::SimulatorMetrics;
use super::status::{next_device_status, next_pit_status};
use super::walk::next_value;
use crate::alarm::{maybe_alarm, Alarm};
use crate::cache::{DeviceCache, DeviceSnapshot, PitCache, PitSnapshot};
use crate::config::{DeviceWalk, PitWalk, SharedRuntimeConfig, WalkConfig};
use crate::entity::{Device, DeviceStatus, Pit};
use crate::reading::{DeviceMetrics, DeviceReading, PitMetrics, PitReading};
use crate::store::{DeviceUpdate, PitUpdate, Store};
use crate::subscription::{Broadcaster, DeviceSummary, MessageType, PitSummary, RealtimeMessage};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{Rng, RngCore};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Shared collaborators handed to the simulator at startup
pub struct SimulatorDeps {
    pub store: Arc<dyn Store>,
    pub pit_cache: Arc<PitCache>,
    pub device_cache: Arc<DeviceCache>,
    pub broadcaster: Arc<Broadcaster>,
    pub runtime: SharedRuntimeConfig,
}

/// Drives one simulation tick at a time over every tracked pit and device
pub struct Simulator {
    store: Arc<dyn Store>,
    pit_cache: Arc<PitCache>,
    device_cache: Arc<DeviceCache>,
    broadcaster: Arc<Broadcaster>,
    runtime: SharedRuntimeConfig,
    walk: WalkConfig,
    metrics: SimulatorMetrics,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

/// Outcome of a single tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub pits_updated: usize,
    pub devices_updated: usize,
    /// Devices not in running or warning
    pub devices_skipped: usize,
    /// Entities whose update was abandoned after a storage error
    pub entity_failures: usize,
    pub alarm: Option<Alarm>,
    /// Subscribers the pit batch was queued for
    pub subscribers_reached: usize,
}

impl Simulator {
    pub fn new(deps: SimulatorDeps, walk: WalkConfig, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            store: deps.store,
            pit_cache: deps.pit_cache,
            device_cache: deps.device_cache,
            broadcaster: deps.broadcaster,
            runtime: deps.runtime,
            walk,
            metrics: SimulatorMetrics::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn metrics(&self) -> &SimulatorMetrics {
        &self.metrics
    }

    /// Whether the runtime flag currently allows ticks to run
    pub fn is_enabled(&self) -> bool {
        self.runtime
            .read()
            .map(|cfg| cfg.simulator_enabled)
            .unwrap_or(false)
    }

    /// Run one tick stamped `now`.
    ///
    /// `elapsed` is the wall-clock time since the previous tick and is added
    /// to the running hours of every active device. Storage failures for a
    /// single entity are logged and counted. A failure to list or publish
    /// entities fails the tick, but the alarm gate is still rolled first.
    pub fn run_tick(&self, now: DateTime<Utc>, elapsed: Duration) -> Result<TickReport> {
        let alarm_probability = self
            .runtime
            .read()
            .map_err(|_| anyhow!("Runtime config lock poisoned"))?
            .alarm_probability;

        // A previous tick that panicked mid-draw leaves the generator usable
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let rng: &mut dyn RngCore = &mut **rng;
        let mut report = TickReport::default();

        let entities = self.tick_entities(rng, now, elapsed, &mut report);
        self.tick_alarm(rng, alarm_probability, now, &mut report);

        entities.map(|()| report)
    }

    fn tick_entities(
        &self,
        rng: &mut dyn RngCore,
        now: DateTime<Utc>,
        elapsed: Duration,
        report: &mut TickReport,
    ) -> Result<()> {
        let pits = self.store.list_pits().context("Failed to list pits")?;
        let mut pit_batch = Vec::with_capacity(pits.len());
        for pit in &pits {
            match self.tick_pit(rng, pit, now) {
                Ok(summary) => {
                    pit_batch.push(summary);
                    report.pits_updated += 1;
                }
                Err(e) => {
                    warn!(pit_id = pit.id, pit_no = %pit.pit_no, error = %e, "Pit update failed");
                    self.metrics.record_entity_failure();
                    report.entity_failures += 1;
                }
            }
        }

        let devices = self.store.list_devices().context("Failed to list devices")?;
        let hours = elapsed.as_secs_f64() / 3600.0;
        let mut device_batch = Vec::with_capacity(devices.len());
        for device in &devices {
            if !device.status.is_active() {
                report.devices_skipped += 1;
                continue;
            }
            match self.tick_device(rng, device, now, hours) {
                Ok(summary) => {
                    device_batch.push(summary);
                    report.devices_updated += 1;
                }
                Err(e) => {
                    warn!(device_id = device.id, device_no = %device.device_no, error = %e, "Device update failed");
                    self.metrics.record_entity_failure();
                    report.entity_failures += 1;
                }
            }
        }

        let outcome = self
            .broadcaster
            .broadcast(&RealtimeMessage::at(MessageType::PitData, &pit_batch, now))?;
        report.subscribers_reached = outcome.delivered;
        self.broadcaster
            .broadcast(&RealtimeMessage::at(MessageType::DeviceData, &device_batch, now))?;
        Ok(())
    }

    /// Roll the alarm gate once; failures here never fail the tick
    fn tick_alarm(
        &self,
        rng: &mut dyn RngCore,
        alarm_probability: f64,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let Some(new_alarm) = maybe_alarm(rng, alarm_probability, now) else {
            return;
        };

        let alarm = match self.store.save_alarm(&new_alarm) {
            Ok(alarm) => alarm,
            Err(e) => {
                warn!(error = %e, "Failed to persist alarm");
                report.entity_failures += 1;
                return;
            }
        };

        self.metrics.record_alarm();
        info!(
            alarm_id = alarm.id,
            level = alarm.level.as_str(),
            category = alarm.category.as_str(),
            source = %alarm.source,
            "Alarm raised"
        );
        if let Err(e) = self
            .broadcaster
            .broadcast(&RealtimeMessage::at(MessageType::Alarm, &alarm, now))
        {
            warn!(alarm_id = alarm.id, error = %e, "Failed to broadcast alarm");
        }
        report.alarm = Some(alarm);
    }

    fn tick_pit(&self, rng: &mut dyn RngCore, pit: &Pit, now: DateTime<Utc>) -> Result<PitSummary> {
        let previous = self.store.latest_pit_reading(pit.id)?;
        let metrics = next_pit_metrics(rng, previous.as_ref().map(|r| &r.metrics), &self.walk.pit);
        let reading = PitReading {
            pit_id: pit.id,
            metrics,
            recorded_at: after(previous.as_ref().map(|r| r.recorded_at), now),
        };
        let transition = next_pit_status(&metrics, pit.status);
        self.store.apply_pit_update(&PitUpdate {
            reading,
            status: transition.changed.then_some(transition.status),
            at: now,
        })?;
        self.metrics.record_reading();
        if transition.changed {
            debug!(
                pit_id = pit.id,
                from = pit.status.as_str(),
                to = transition.status.as_str(),
                "Pit status changed"
            );
        }

        self.pit_cache.put(
            pit.id,
            PitSnapshot {
                pit_id: pit.id,
                pit_no: pit.pit_no.clone(),
                zone: pit.zone.clone(),
                row: pit.row,
                col: pit.col,
                temperature: Some(metrics.temperature),
                humidity: Some(metrics.humidity),
                ph_value: Some(metrics.ph_value),
                status: transition.status,
                updated_at: now,
            },
        );

        Ok(PitSummary {
            pit_id: pit.id,
            pit_no: pit.pit_no.clone(),
            temperature: metrics.temperature,
            humidity: metrics.humidity,
            ph_value: metrics.ph_value,
            status: transition.status,
        })
    }

    fn tick_device(
        &self,
        rng: &mut dyn RngCore,
        device: &Device,
        now: DateTime<Utc>,
        hours: f64,
    ) -> Result<DeviceSummary> {
        let previous = self.store.latest_device_reading(device.id)?;
        let metrics = next_device_metrics(
            rng,
            previous.as_ref().map(|r| &r.metrics),
            device.status,
            &self.walk.device,
        );
        let reading = DeviceReading {
            device_id: device.id,
            metrics,
            recorded_at: after(previous.as_ref().map(|r| r.recorded_at), now),
        };
        let transition = next_device_status(&metrics, device.status);
        let running_hours = self.store.apply_device_update(&DeviceUpdate {
            reading,
            status: transition.changed.then_some(transition.status),
            running_hours: hours,
            at: now,
        })?;
        self.metrics.record_reading();
        if transition.changed {
            debug!(
                device_id = device.id,
                from = device.status.as_str(),
                to = transition.status.as_str(),
                "Device status changed"
            );
        }

        self.device_cache.put(
            device.id,
            DeviceSnapshot {
                device_id: device.id,
                device_no: device.device_no.clone(),
                name: device.name.clone(),
                device_type: device.device_type.clone(),
                power: metrics.power,
                temperature: metrics.temperature,
                vibration: metrics.vibration,
                speed: metrics.speed,
                current: metrics.current,
                status: transition.status,
                running_hours,
                updated_at: now,
            },
        );

        Ok(DeviceSummary {
            device_id: device.id,
            device_no: device.device_no.clone(),
            power: metrics.power,
            temperature: metrics.temperature,
            vibration: metrics.vibration,
            status: transition.status,
        })
    }
}

/// Next pit metrics; each metric walks independently
pub fn next_pit_metrics<R: Rng + ?Sized>(
    rng: &mut R,
    previous: Option<&PitMetrics>,
    walk: &PitWalk,
) -> PitMetrics {
    PitMetrics {
        temperature: next_value(rng, previous.map(|m| m.temperature), &walk.temperature),
        humidity: next_value(rng, previous.map(|m| m.humidity), &walk.humidity),
        ph_value: next_value(rng, previous.map(|m| m.ph_value), &walk.ph_value),
        acidity: next_value(rng, previous.map(|m| m.acidity), &walk.acidity),
        moisture: next_value(rng, previous.map(|m| m.moisture), &walk.moisture),
        alcohol: next_value(rng, previous.map(|m| m.alcohol), &walk.alcohol),
    }
}

/// Next device metrics. Devices in warning vibrate harder.
pub fn next_device_metrics<R: Rng + ?Sized>(
    rng: &mut R,
    previous: Option<&DeviceMetrics>,
    status: DeviceStatus,
    walk: &DeviceWalk,
) -> DeviceMetrics {
    let mut vibration = walk.vibration;
    if status == DeviceStatus::Warning {
        vibration.drift += walk.warning_vibration_drift;
    }

    DeviceMetrics {
        power: next_value(rng, previous.map(|m| m.power), &walk.power),
        current: next_value(rng, previous.map(|m| m.current), &walk.current),
        temperature: next_value(rng, previous.map(|m| m.temperature), &walk.temperature),
        vibration: next_value(rng, previous.map(|m| m.vibration), &vibration),
        speed: next_value(rng, previous.map(|m| m.speed), &walk.speed),
    }
}

/// `now`, or 1ms past `previous` when the clock has not moved forward
fn after(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + ChronoDuration::milliseconds(1),
        _ => now,
    }
}

/// Run the simulator on a fixed schedule until `shutdown` flips to true.
///
/// Ticks never overlap: the loop awaits each tick before waiting for the
/// next one, and ticks missed meanwhile are skipped. A tick that errors or
/// panics is logged and the schedule carries on. On shutdown an in-flight
/// tick is allowed to finish.
pub async fn run_simulator(
    simulator: Arc<Simulator>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_start: Option<Instant> = None;

    info!(interval_ms = period.as_millis() as u64, "Simulator started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            // Sender dropped counts as shutdown too
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            break;
        }

        if !simulator.is_enabled() {
            simulator.metrics().record_tick_skipped();
            last_start = None;
            continue;
        }

        let started = Instant::now();
        let elapsed = last_start.map_or(period, |prev| started.duration_since(prev));
        last_start = Some(started);
        let now = Utc::now();

        let worker = Arc::clone(&simulator);
        let result = tokio::task::spawn_blocking(move || worker.run_tick(now, elapsed)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(report)) => {
                simulator.metrics().record_tick(now, duration_ms);
                debug!(
                    pits = report.pits_updated,
                    devices = report.devices_updated,
                    skipped = report.devices_skipped,
                    failures = report.entity_failures,
                    alarm = report.alarm.is_some(),
                    subscribers = report.subscribers_reached,
                    duration_ms,
                    "Tick completed"
                );
            }
            Ok(Err(e)) => {
                simulator.metrics().record_tick_failure();
                error!(error = %e, "Tick failed");
            }
            Err(e) => {
                simulator.metrics().record_tick_failure();
                error!(error = %e, "Tick panicked");
            }
        }
    }

    info!("Simulator stopped");
}
