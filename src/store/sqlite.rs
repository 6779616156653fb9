//! SQLite-backed store.
//!
//! # Schema
//! ```sql
//! CREATE TABLE pits (id, pit_no UNIQUE, zone, pit_row, pit_col, status, pit_age,
//!                    fermentation_day, grain_type, created_at, updated_at);
//! CREATE TABLE devices (id, device_no UNIQUE, name, device_type, location, status,
//!                       running_hours, created_at, updated_at);
//! CREATE TABLE pit_sensor_data (id, pit_id, temperature, humidity, ph_value, acidity,
//!                               moisture, alcohol, recorded_at);
//! CREATE TABLE device_data (id, device_id, power, speed, vibration, temperature,
//!                           current, recorded_at);
//! CREATE TABLE alarms (id, level, type, source, message, status, created_at);
//! ```
//!
//! Enum columns are stored as their lowercase names, timestamps as text.

use super::{DeviceUpdate, PitUpdate, Store};
use crate::alarm::{Alarm, AlarmCategory, AlarmLevel, AlarmStatus, NewAlarm};
use crate::entity::{Device, DeviceStatus, EntityId, NewDevice, NewPit, Pit, PitStatus};
use crate::reading::{DeviceMetrics, DeviceReading, PitMetrics, PitReading};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Store enums as their lowercase text form
macro_rules! text_enum_sql {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e| FromSqlError::Other(Box::new(e)))
                }
            }
        )*
    };
}

text_enum_sql!(PitStatus, DeviceStatus, AlarmLevel, AlarmCategory, AlarmStatus);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS pits (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        pit_no           TEXT UNIQUE NOT NULL,
        zone             TEXT NOT NULL,
        pit_row          INTEGER NOT NULL,
        pit_col          INTEGER NOT NULL,
        status           TEXT NOT NULL,
        pit_age          INTEGER NOT NULL,
        fermentation_day INTEGER NOT NULL,
        grain_type       TEXT NOT NULL,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS devices (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        device_no     TEXT UNIQUE NOT NULL,
        name          TEXT NOT NULL,
        device_type   TEXT NOT NULL,
        location      TEXT NOT NULL,
        status        TEXT NOT NULL,
        running_hours REAL NOT NULL,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pit_sensor_data (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        pit_id      INTEGER NOT NULL,
        temperature REAL NOT NULL,
        humidity    REAL NOT NULL,
        ph_value    REAL NOT NULL,
        acidity     REAL NOT NULL,
        moisture    REAL NOT NULL,
        alcohol     REAL NOT NULL,
        recorded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_pit_sensor_pit_time
        ON pit_sensor_data(pit_id, recorded_at);

    CREATE TABLE IF NOT EXISTS device_data (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id   INTEGER NOT NULL,
        power       REAL NOT NULL,
        speed       REAL NOT NULL,
        vibration   REAL NOT NULL,
        temperature REAL NOT NULL,
        current     REAL NOT NULL,
        recorded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_device_data_device_time
        ON device_data(device_id, recorded_at);

    CREATE TABLE IF NOT EXISTS alarms (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        level      TEXT NOT NULL,
        type       TEXT NOT NULL,
        source     TEXT NOT NULL,
        message    TEXT NOT NULL,
        status     TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_alarms_status ON alarms(status);
"#;

/// Persists entities, readings and alarms in SQLite.
///
/// The connection is wrapped in a Mutex; each trait call holds it for a
/// single statement, or for one transaction in the `apply_*_update` calls.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database and ensures the schema exists.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    fn group_counts<K>(&self, sql: &str) -> Result<HashMap<K, u64>>
    where
        K: FromSql + Eq + Hash,
    {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).context("Failed to prepare count query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, K>(0)?, row.get::<_, i64>(1)?)))
            .context("Failed to execute count query")?;

        let mut counts = HashMap::new();
        for row in rows {
            let (key, count) = row.context("Failed to read count row")?;
            counts.insert(key, count.max(0) as u64);
        }
        Ok(counts)
    }
}

fn insert_pit_reading(conn: &Connection, reading: &PitReading) -> Result<()> {
    let m = &reading.metrics;
    conn.execute(
        "INSERT INTO pit_sensor_data
            (pit_id, temperature, humidity, ph_value, acidity, moisture, alcohol, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            reading.pit_id,
            m.temperature,
            m.humidity,
            m.ph_value,
            m.acidity,
            m.moisture,
            m.alcohol,
            reading.recorded_at,
        ],
    )
    .context("Failed to insert pit reading")?;
    Ok(())
}

fn insert_device_reading(conn: &Connection, reading: &DeviceReading) -> Result<()> {
    let m = &reading.metrics;
    conn.execute(
        "INSERT INTO device_data
            (device_id, power, speed, vibration, temperature, current, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            reading.device_id,
            m.power,
            m.speed,
            m.vibration,
            m.temperature,
            m.current,
            reading.recorded_at,
        ],
    )
    .context("Failed to insert device reading")?;
    Ok(())
}

fn pit_from_row(row: &Row<'_>) -> rusqlite::Result<Pit> {
    Ok(Pit {
        id: row.get("id")?,
        pit_no: row.get("pit_no")?,
        zone: row.get("zone")?,
        row: row.get("pit_row")?,
        col: row.get("pit_col")?,
        status: row.get("status")?,
        pit_age: row.get("pit_age")?,
        fermentation_day: row.get("fermentation_day")?,
        grain_type: row.get("grain_type")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get("id")?,
        device_no: row.get("device_no")?,
        name: row.get("name")?,
        device_type: row.get("device_type")?,
        location: row.get("location")?,
        status: row.get("status")?,
        running_hours: row.get("running_hours")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn alarm_from_row(row: &Row<'_>) -> rusqlite::Result<Alarm> {
    Ok(Alarm {
        id: row.get("id")?,
        level: row.get("level")?,
        category: row.get("type")?,
        source: row.get("source")?,
        message: row.get("message")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
    })
}

fn pit_reading_from_row(row: &Row<'_>) -> rusqlite::Result<PitReading> {
    Ok(PitReading {
        pit_id: row.get("pit_id")?,
        metrics: PitMetrics {
            temperature: row.get("temperature")?,
            humidity: row.get("humidity")?,
            ph_value: row.get("ph_value")?,
            acidity: row.get("acidity")?,
            moisture: row.get("moisture")?,
            alcohol: row.get("alcohol")?,
        },
        recorded_at: row.get("recorded_at")?,
    })
}

fn device_reading_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceReading> {
    Ok(DeviceReading {
        device_id: row.get("device_id")?,
        metrics: DeviceMetrics {
            power: row.get("power")?,
            speed: row.get("speed")?,
            vibration: row.get("vibration")?,
            temperature: row.get("temperature")?,
            current: row.get("current")?,
        },
        recorded_at: row.get("recorded_at")?,
    })
}

impl Store for SqliteStore {
    fn list_pits(&self) -> Result<Vec<Pit>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT * FROM pits ORDER BY id")
            .context("Failed to prepare pit query")?;
        let pits = stmt
            .query_map([], pit_from_row)
            .context("Failed to query pits")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read pit row")?;
        Ok(pits)
    }

    fn list_devices(&self) -> Result<Vec<Device>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT * FROM devices ORDER BY id")
            .context("Failed to prepare device query")?;
        let devices = stmt
            .query_map([], device_from_row)
            .context("Failed to query devices")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read device row")?;
        Ok(devices)
    }

    fn latest_pit_reading(&self, pit_id: EntityId) -> Result<Option<PitReading>> {
        self.conn()?
            .query_row(
                "SELECT * FROM pit_sensor_data WHERE pit_id = ?1
                 ORDER BY recorded_at DESC, id DESC LIMIT 1",
                params![pit_id],
                pit_reading_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to load latest reading for pit {}", pit_id))
    }

    fn latest_device_reading(&self, device_id: EntityId) -> Result<Option<DeviceReading>> {
        self.conn()?
            .query_row(
                "SELECT * FROM device_data WHERE device_id = ?1
                 ORDER BY recorded_at DESC, id DESC LIMIT 1",
                params![device_id],
                device_reading_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to load latest reading for device {}", device_id))
    }

    fn save_pit_reading(&self, reading: &PitReading) -> Result<()> {
        insert_pit_reading(&*self.conn()?, reading)
    }

    fn save_device_reading(&self, reading: &DeviceReading) -> Result<()> {
        insert_device_reading(&*self.conn()?, reading)
    }

    fn apply_pit_update(&self, update: &PitUpdate) -> Result<()> {
        let pit_id = update.reading.pit_id;
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin pit update")?;

        insert_pit_reading(&tx, &update.reading)?;
        if let Some(status) = update.status {
            let updated = tx
                .execute(
                    "UPDATE pits SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status, update.at, pit_id],
                )
                .context("Failed to update pit status")?;
            if updated == 0 {
                // Dropping tx rolls the reading back
                return Err(anyhow!("pit {} not found", pit_id));
            }
        }

        tx.commit()
            .with_context(|| format!("Failed to commit update for pit {}", pit_id))
    }

    fn apply_device_update(&self, update: &DeviceUpdate) -> Result<f64> {
        let device_id = update.reading.device_id;
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin device update")?;

        insert_device_reading(&tx, &update.reading)?;
        if let Some(status) = update.status {
            tx.execute(
                "UPDATE devices SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, update.at, device_id],
            )
            .context("Failed to update device status")?;
        }
        let running_hours: f64 = tx
            .query_row(
                "UPDATE devices SET running_hours = running_hours + ?1
                 WHERE id = ?2 RETURNING running_hours",
                params![update.running_hours, device_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to update running hours")?
            .ok_or_else(|| anyhow!("device {} not found", device_id))?;

        tx.commit()
            .with_context(|| format!("Failed to commit update for device {}", device_id))?;
        Ok(running_hours)
    }

    fn save_alarm(&self, alarm: &NewAlarm) -> Result<Alarm> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO alarms (level, type, source, message, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                alarm.level,
                alarm.category,
                alarm.source,
                alarm.message,
                AlarmStatus::Active,
                alarm.created_at,
            ],
        )
        .context("Failed to insert alarm")?;
        Ok(alarm.clone().into_alarm(conn.last_insert_rowid()))
    }

    fn pit_status_counts(&self) -> Result<HashMap<PitStatus, u64>> {
        self.group_counts("SELECT status, COUNT(*) FROM pits GROUP BY status")
    }

    fn device_status_counts(&self) -> Result<HashMap<DeviceStatus, u64>> {
        self.group_counts("SELECT status, COUNT(*) FROM devices GROUP BY status")
    }

    fn active_alarm_counts(&self) -> Result<HashMap<AlarmLevel, u64>> {
        self.group_counts("SELECT level, COUNT(*) FROM alarms WHERE status = 'active' GROUP BY level")
    }

    fn alarms_since(&self, since: DateTime<Utc>) -> Result<Vec<Alarm>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM alarms WHERE created_at >= ?1
                 ORDER BY created_at, id",
            )
            .context("Failed to prepare alarm query")?;
        let alarms = stmt
            .query_map(params![since], alarm_from_row)
            .context("Failed to query alarms")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read alarm row")?;
        Ok(alarms)
    }

    fn insert_pit(&self, pit: &NewPit) -> Result<Pit> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pits
                (pit_no, zone, pit_row, pit_col, status, pit_age, fermentation_day,
                 grain_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                pit.pit_no,
                pit.zone,
                pit.row,
                pit.col,
                pit.status,
                pit.pit_age,
                pit.fermentation_day,
                pit.grain_type,
                now,
                now,
            ],
        )
        .with_context(|| format!("Failed to insert pit '{}'", pit.pit_no))?;

        Ok(Pit {
            id: conn.last_insert_rowid(),
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
        })
    }

    fn insert_device(&self, device: &NewDevice) -> Result<Device> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO devices
                (device_no, name, device_type, location, status, running_hours,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                device.device_no,
                device.name,
                device.device_type,
                device.location,
                device.status,
                device.running_hours,
                now,
                now,
            ],
        )
        .with_context(|| format!("Failed to insert device '{}'", device.device_no))?;

        Ok(Device {
            id: conn.last_insert_rowid(),
            device_no: device.device_no.clone(),
            name: device.name.clone(),
            device_type: device.device_type.clone(),
            location: device.location.clone(),
            status: device.status,
            running_hours: device.running_hours,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn new_pit(no: &str) -> NewPit {
        NewPit {
            pit_no: no.to_string(),
            zone: "B".to_string(),
            row: 2,
            col: 3,
            status: PitStatus::Normal,
            pit_age: 80,
            fermentation_day: 12,
            grain_type: "wheat".to_string(),
        }
    }

    fn new_device(no: &str, status: DeviceStatus) -> NewDevice {
        NewDevice {
            device_no: no.to_string(),
            name: format!("motor-{}", no),
            device_type: "motor".to_string(),
            location: "Zone A".to_string(),
            status,
            running_hours: 100.0,
        }
    }

    fn pit_reading(pit_id: EntityId, temperature: f64, at: DateTime<Utc>) -> PitReading {
        PitReading {
            pit_id,
            metrics: PitMetrics {
                temperature,
                humidity: 70.0,
                ph_value: 4.5,
                acidity: 1.0,
                moisture: 55.0,
                alcohol: 5.0,
            },
            recorded_at: at,
        }
    }

    #[test]
    fn test_insert_and_list_pits() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.insert_pit(&new_pit("B-001")).unwrap();
        let b = store.insert_pit(&new_pit("B-002")).unwrap();

        let pits = store.list_pits().unwrap();
        assert_eq!(pits.len(), 2);
        assert_eq!(pits[0].id, a.id);
        assert_eq!(pits[1].pit_no, b.pit_no);
        assert_eq!(pits[0].status, PitStatus::Normal);
        assert_eq!(pits[0].grain_type, "wheat");
    }

    #[test]
    fn test_duplicate_pit_no_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_pit(&new_pit("B-001")).unwrap();
        assert!(store.insert_pit(&new_pit("B-001")).is_err());
    }

    #[test]
    fn test_latest_reading_by_time() {
        let store = SqliteStore::open_in_memory().unwrap();
        let pit = store.insert_pit(&new_pit("B-001")).unwrap();
        let t0 = Utc::now();

        assert!(store.latest_pit_reading(pit.id).unwrap().is_none());

        store.save_pit_reading(&pit_reading(pit.id, 25.0, t0)).unwrap();
        store
            .save_pit_reading(&pit_reading(pit.id, 26.0, t0 + Duration::seconds(5)))
            .unwrap();
        // Another pit's reading must not leak in
        store
            .save_pit_reading(&pit_reading(pit.id + 100, 44.0, t0 + Duration::seconds(10)))
            .unwrap();

        let latest = store.latest_pit_reading(pit.id).unwrap().unwrap();
        assert_eq!(latest.metrics.temperature, 26.0);
        assert_eq!(
            latest.recorded_at.timestamp_millis(),
            (t0 + Duration::seconds(5)).timestamp_millis()
        );
    }

    #[test]
    fn test_device_reading_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let device = store.insert_device(&new_device("M-001", DeviceStatus::Running)).unwrap();
        let reading = DeviceReading {
            device_id: device.id,
            metrics: DeviceMetrics {
                power: 15.5,
                speed: 1400.0,
                vibration: 1.2,
                temperature: 45.3,
                current: 5.1,
            },
            recorded_at: Utc::now(),
        };
        store.save_device_reading(&reading).unwrap();

        let latest = store.latest_device_reading(device.id).unwrap().unwrap();
        assert_eq!(latest.metrics, reading.metrics);
    }

    fn device_reading(device_id: EntityId, at: DateTime<Utc>) -> DeviceReading {
        DeviceReading {
            device_id,
            metrics: DeviceMetrics {
                power: 15.0,
                speed: 1400.0,
                vibration: 8.5,
                temperature: 45.0,
                current: 5.0,
            },
            recorded_at: at,
        }
    }

    fn pit_reading_count(store: &SqliteStore) -> i64 {
        store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM pit_sensor_data", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_status_updates_and_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let pit = store.insert_pit(&new_pit("B-001")).unwrap();
        store.insert_pit(&new_pit("B-002")).unwrap();
        let device = store.insert_device(&new_device("M-001", DeviceStatus::Running)).unwrap();
        store.insert_device(&new_device("M-002", DeviceStatus::Stopped)).unwrap();

        let at = Utc::now();
        store
            .apply_pit_update(&PitUpdate {
                reading: pit_reading(pit.id, 41.0, at),
                status: Some(PitStatus::Alarm),
                at,
            })
            .unwrap();
        store
            .apply_device_update(&DeviceUpdate {
                reading: device_reading(device.id, at),
                status: Some(DeviceStatus::Fault),
                running_hours: 0.0,
                at,
            })
            .unwrap();

        let pits = store.list_pits().unwrap();
        assert_eq!(pits[0].status, PitStatus::Alarm);
        assert_eq!(pits[0].updated_at.timestamp_millis(), at.timestamp_millis());
        assert_eq!(
            store.latest_pit_reading(pit.id).unwrap().unwrap().metrics.temperature,
            41.0
        );

        let pit_counts = store.pit_status_counts().unwrap();
        assert_eq!(pit_counts.get(&PitStatus::Alarm), Some(&1));
        assert_eq!(pit_counts.get(&PitStatus::Normal), Some(&1));

        let device_counts = store.device_status_counts().unwrap();
        assert_eq!(device_counts.get(&DeviceStatus::Fault), Some(&1));
        assert_eq!(device_counts.get(&DeviceStatus::Stopped), Some(&1));
        assert_eq!(device_counts.get(&DeviceStatus::Running), None);
    }

    #[test]
    fn test_failed_pit_update_rolls_back_reading() {
        let store = SqliteStore::open_in_memory().unwrap();
        let update = PitUpdate {
            reading: pit_reading(7, 44.0, Utc::now()),
            status: Some(PitStatus::Warning),
            at: Utc::now(),
        };

        assert!(store.apply_pit_update(&update).is_err());
        assert!(store.latest_pit_reading(7).unwrap().is_none());
        assert_eq!(pit_reading_count(&store), 0);
    }

    #[test]
    fn test_failed_device_update_rolls_back_reading() {
        let store = SqliteStore::open_in_memory().unwrap();
        let update = DeviceUpdate {
            reading: device_reading(7, Utc::now()),
            status: Some(DeviceStatus::Fault),
            running_hours: 1.0,
            at: Utc::now(),
        };

        assert!(store.apply_device_update(&update).is_err());
        assert!(store.latest_device_reading(7).unwrap().is_none());
    }

    #[test]
    fn test_running_hours_accumulate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let device = store.insert_device(&new_device("M-001", DeviceStatus::Running)).unwrap();
        let update = |hours| DeviceUpdate {
            reading: device_reading(device.id, Utc::now()),
            status: None,
            running_hours: hours,
            at: Utc::now(),
        };

        assert_eq!(store.apply_device_update(&update(0.5)).unwrap(), 100.5);
        assert_eq!(store.apply_device_update(&update(0.25)).unwrap(), 100.75);
        assert_eq!(store.list_devices().unwrap()[0].status, DeviceStatus::Running);
    }

    #[test]
    fn test_alarms_persist_and_count_active() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alarm = NewAlarm {
            level: AlarmLevel::Warning,
            category: AlarmCategory::Humidity,
            source: "pit-A-4".to_string(),
            message: AlarmCategory::Humidity.message().to_string(),
            created_at: Utc::now(),
        };

        let first = store.save_alarm(&alarm).unwrap();
        let second = store.save_alarm(&alarm).unwrap();
        assert!(second.id > first.id);
        assert_eq!(first.status, AlarmStatus::Active);

        let counts = store.active_alarm_counts().unwrap();
        assert_eq!(counts.get(&AlarmLevel::Warning), Some(&2));
    }

    #[test]
    fn test_alarms_since_returns_recent_in_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let alarm_at = |level, created_at| NewAlarm {
            level,
            category: AlarmCategory::Temperature,
            source: "pit-A-2".to_string(),
            message: AlarmCategory::Temperature.message().to_string(),
            created_at,
        };

        store.save_alarm(&alarm_at(AlarmLevel::Info, now - Duration::minutes(10))).unwrap();
        store.save_alarm(&alarm_at(AlarmLevel::Critical, now - Duration::hours(25))).unwrap();
        store.save_alarm(&alarm_at(AlarmLevel::Error, now - Duration::hours(3))).unwrap();

        let recent = store.alarms_since(now - Duration::hours(24)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].level, AlarmLevel::Error);
        assert_eq!(recent[1].level, AlarmLevel::Info);
        assert_eq!(recent[1].category, AlarmCategory::Temperature);
        assert_eq!(recent[1].status, AlarmStatus::Active);
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("brewtwin.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            let pit = store.insert_pit(&new_pit("B-001")).unwrap();
            store.save_pit_reading(&pit_reading(pit.id, 30.5, Utc::now())).unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        let pits = reopened.list_pits().unwrap();
        assert_eq!(pits.len(), 1);
        let latest = reopened.latest_pit_reading(pits[0].id).unwrap().unwrap();
        assert_eq!(latest.metrics.temperature, 30.5);
    }
}
