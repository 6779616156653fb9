use super::*;
use crate::alarm::{AlarmCategory, NewAlarm};
use crate::entity::{NewDevice, NewPit};
use crate::reading::{PitMetrics, PitReading};
use crate::store::{MemoryStore, PitUpdate};
use crate::subscription::SubscriberChannel;

struct Fixture {
    store: Arc<MemoryStore>,
    pit_cache: Arc<PitCache>,
    device_cache: Arc<DeviceCache>,
    broadcaster: Arc<Broadcaster>,
    service: DashboardService,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let pit_cache = Arc::new(PitCache::new());
    let device_cache = Arc::new(DeviceCache::new());
    let broadcaster = Arc::new(Broadcaster::new());
    let service = DashboardService::new(
        store.clone(),
        pit_cache.clone(),
        device_cache.clone(),
        broadcaster.clone(),
        SimulatorMetrics::new(),
    );
    Fixture {
        store,
        pit_cache,
        device_cache,
        broadcaster,
        service,
    }
}

fn new_pit(no: &str, row: u32) -> NewPit {
    NewPit {
        pit_no: no.to_string(),
        zone: "C".to_string(),
        row,
        col: 2,
        status: PitStatus::Normal,
        pit_age: 40,
        fermentation_day: 7,
        grain_type: "wheat".to_string(),
    }
}

fn pit_snapshot(pit_id: EntityId, temperature: f64, humidity: f64) -> PitSnapshot {
    PitSnapshot {
        pit_id,
        pit_no: format!("C-{:03}", pit_id),
        zone: "C".to_string(),
        row: 1,
        col: 1,
        temperature: Some(temperature),
        humidity: Some(humidity),
        ph_value: Some(4.5),
        status: PitStatus::Normal,
        updated_at: Utc::now(),
    }
}

fn device_snapshot(device_id: EntityId, power: f64, status: DeviceStatus) -> DeviceSnapshot {
    DeviceSnapshot {
        device_id,
        device_no: format!("P-{:03}", device_id),
        name: format!("pump-{}", device_id),
        device_type: "pump".to_string(),
        power,
        temperature: 45.0,
        vibration: 1.0,
        speed: 1400.0,
        current: 5.0,
        status,
        running_hours: 10.0,
        updated_at: Utc::now(),
    }
}

#[test]
fn test_stats_defaults_with_empty_cache() {
    let f = fixture();
    let stats = f.service.stats().unwrap();

    assert_eq!(stats.total_pits, 0);
    assert_eq!(stats.active_alarms, 0);
    assert_eq!(stats.avg_temperature, DEFAULT_AVG_TEMPERATURE);
    assert_eq!(stats.avg_humidity, DEFAULT_AVG_HUMIDITY);
    assert_eq!(stats.total_power, 0.0);
}

#[test]
fn test_stats_combines_store_counts_and_cache() {
    let f = fixture();
    let a = f.store.insert_pit(&new_pit("C-001", 1)).unwrap();
    f.store.insert_pit(&new_pit("C-002", 2)).unwrap();
    f.store
        .apply_pit_update(&PitUpdate {
            reading: PitReading {
                pit_id: a.id,
                metrics: PitMetrics {
                    temperature: 36.0,
                    humidity: 70.0,
                    ph_value: 4.5,
                    acidity: 1.0,
                    moisture: 55.0,
                    alcohol: 5.0,
                },
                recorded_at: Utc::now(),
            },
            status: Some(PitStatus::Warning),
            at: Utc::now(),
        })
        .unwrap();
    f.store
        .insert_device(&NewDevice {
            device_no: "P-001".to_string(),
            name: "pump-1".to_string(),
            device_type: "pump".to_string(),
            location: "Zone C".to_string(),
            status: DeviceStatus::Fault,
            running_hours: 0.0,
        })
        .unwrap();
    f.store
        .save_alarm(&NewAlarm {
            level: AlarmLevel::Critical,
            category: AlarmCategory::System,
            source: "pit-A-3".to_string(),
            message: AlarmCategory::System.message().to_string(),
            created_at: Utc::now(),
        })
        .unwrap();

    f.pit_cache.put(1, pit_snapshot(1, 30.0, 60.0));
    f.pit_cache.put(2, pit_snapshot(2, 20.0, 80.0));
    f.device_cache.put(1, device_snapshot(1, 12.5, DeviceStatus::Running));
    f.device_cache.put(2, device_snapshot(2, 7.5, DeviceStatus::Warning));

    let stats = f.service.stats().unwrap();
    assert_eq!(stats.total_pits, 2);
    assert_eq!(stats.normal_pits, 1);
    assert_eq!(stats.warning_pits, 1);
    assert_eq!(stats.alarm_pits, 0);
    assert_eq!(stats.total_devices, 1);
    assert_eq!(stats.fault_devices, 1);
    assert_eq!(stats.active_alarms, 1);
    assert_eq!(stats.alarms_by_level.get(&AlarmLevel::Critical), Some(&1));
    assert_eq!(stats.avg_temperature, 25.0);
    assert_eq!(stats.avg_humidity, 70.0);
    assert_eq!(stats.total_power, 20.0);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["alarmsByLevel"]["critical"], 1);
    assert_eq!(json["avgTemperature"], 25.0);
}

#[test]
fn test_heatmap_prefers_cache() {
    let f = fixture();
    f.store.insert_pit(&new_pit("C-001", 1)).unwrap();
    f.pit_cache.put(9, pit_snapshot(9, 33.0, 70.0));
    f.pit_cache.put(4, pit_snapshot(4, 31.0, 70.0));

    let heatmap = f.service.heatmap().unwrap();
    let ids: Vec<EntityId> = heatmap.iter().map(|c| c.pit_id).collect();
    assert_eq!(ids, vec![4, 9]);
}

#[test]
fn test_heatmap_falls_back_to_store() {
    let f = fixture();
    let with_reading = f.store.insert_pit(&new_pit("C-001", 1)).unwrap();
    let without_reading = f.store.insert_pit(&new_pit("C-002", 2)).unwrap();
    let recorded_at = Utc::now();
    f.store
        .save_pit_reading(&PitReading {
            pit_id: with_reading.id,
            metrics: PitMetrics {
                temperature: 36.2,
                humidity: 71.0,
                ph_value: 4.4,
                acidity: 1.1,
                moisture: 54.0,
                alcohol: 5.2,
            },
            recorded_at,
        })
        .unwrap();

    let heatmap = f.service.heatmap().unwrap();
    assert_eq!(heatmap.len(), 2);

    assert_eq!(heatmap[0].pit_id, with_reading.id);
    assert_eq!(heatmap[0].temperature, Some(36.2));
    assert_eq!(heatmap[0].ph_value, Some(4.4));
    assert_eq!(heatmap[0].updated_at, recorded_at);

    assert_eq!(heatmap[1].pit_id, without_reading.id);
    assert_eq!(heatmap[1].row, 2);
    assert_eq!(heatmap[1].temperature, None);
    assert_eq!(heatmap[1].humidity, None);

    // Fallback reads leave the cache to the simulator
    assert!(f.pit_cache.is_empty());
}

#[test]
fn test_realtime_metrics() {
    let f = fixture();
    f.pit_cache.put(1, pit_snapshot(1, 28.0, 66.0));
    f.device_cache.put(1, device_snapshot(1, 10.0, DeviceStatus::Running));
    f.device_cache.put(2, device_snapshot(2, 4.0, DeviceStatus::Warning));
    f.device_cache.put(3, device_snapshot(3, 6.0, DeviceStatus::Running));

    let metrics = f.service.realtime_metrics().unwrap();
    assert_eq!(metrics.temperature, 28.0);
    assert_eq!(metrics.humidity, 66.0);
    assert_eq!(metrics.power, 20.0);
    assert_eq!(metrics.active_pits, 1);
    assert_eq!(metrics.running_devices, 2);
    assert_eq!(metrics.active_alarms, 0);
}

#[test]
fn test_snapshot_lookups() {
    let f = fixture();
    f.device_cache.put(3, device_snapshot(3, 6.0, DeviceStatus::Running));
    f.device_cache.put(1, device_snapshot(1, 10.0, DeviceStatus::Running));

    assert!(f.service.pit_snapshot(1).is_none());
    assert_eq!(f.service.device_snapshot(3).unwrap().power, 6.0);
    let ids: Vec<EntityId> = f
        .service
        .device_snapshots()
        .iter()
        .map(|d| d.device_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_system_info_reports_connections_and_cache() {
    let f = fixture();
    let (channel, _rx) = SubscriberChannel::new(4);
    f.broadcaster.register(channel);
    f.pit_cache.put(1, pit_snapshot(1, 28.0, 66.0));

    let info = f.service.system_info();
    assert_eq!(info.ws_connections, 1);
    assert_eq!(f.service.live_subscriber_count(), 1);
    assert_eq!(info.cache_entries.pits, 1);
    assert_eq!(info.cache_entries.devices, 0);
    assert!(info.cache_entries.last_write.is_some());
    assert_eq!(info.ticks.ticks_completed, 0);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["wsConnections"], 1);
    assert_eq!(json["cacheEntries"]["pits"], 1);
}

fn alarm_at(level: AlarmLevel, created_at: DateTime<Utc>) -> NewAlarm {
    NewAlarm {
        level,
        category: AlarmCategory::Humidity,
        source: "pit-A-8".to_string(),
        message: AlarmCategory::Humidity.message().to_string(),
        created_at,
    }
}

#[test]
fn test_alarm_trend_empty_has_all_buckets() {
    let f = fixture();
    let now = Utc::now();

    let trend = f.service.alarm_trend(now).unwrap();
    assert_eq!(trend.len(), ALARM_TREND_HOURS);
    assert!(trend.iter().all(|p| p.count == 0));
    assert_eq!(trend[0].starts_at, now - ChronoDuration::hours(24));
    assert_eq!(trend[23].starts_at, now - ChronoDuration::hours(1));
}

#[test]
fn test_alarm_trend_buckets_by_hour() {
    let f = fixture();
    let now = "2026-03-01T12:30:00Z".parse::<DateTime<Utc>>().unwrap();
    let ago = |minutes| now - ChronoDuration::minutes(minutes);

    // Outside the window
    f.store.save_alarm(&alarm_at(AlarmLevel::Info, ago(25 * 60))).unwrap();
    // First bucket: starts 12:30 the day before
    f.store.save_alarm(&alarm_at(AlarmLevel::Error, ago(24 * 60))).unwrap();
    f.store.save_alarm(&alarm_at(AlarmLevel::Warning, ago(23 * 60 + 1))).unwrap();
    // Last bucket
    f.store.save_alarm(&alarm_at(AlarmLevel::Critical, ago(10))).unwrap();
    f.store.save_alarm(&alarm_at(AlarmLevel::Critical, ago(59))).unwrap();
    // Middle
    f.store.save_alarm(&alarm_at(AlarmLevel::Info, ago(5 * 60 + 30))).unwrap();

    let trend = f.service.alarm_trend(now).unwrap();
    assert_eq!(trend[0].count, 2);
    assert_eq!(trend[0].hour, "12:00");
    assert_eq!(trend[18].count, 1);
    assert_eq!(trend[23].count, 2);
    assert_eq!(trend[23].hour, "11:00");
    assert_eq!(trend.iter().map(|p| p.count).sum::<u64>(), 5);

    let json = serde_json::to_value(f.service.overview(now).unwrap()).unwrap();
    assert_eq!(json["alarmTrend"].as_array().unwrap().len(), 24);
    assert_eq!(json["alarmTrend"][23]["count"], 2);
}
