// Telemetry readings produced by the simulator
//
// One reading per entity per tick. Readings are never mutated once persisted.

use crate::entity::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fermentation pit environment metrics
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitMetrics {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    pub ph_value: f64,
    pub acidity: f64,
    /// Percent
    pub moisture: f64,
    /// Percent by volume
    pub alcohol: f64,
}

/// Device operating metrics
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetrics {
    /// Kilowatts
    pub power: f64,
    /// RPM
    pub speed: f64,
    /// mm/s
    pub vibration: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Amperes
    pub current: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitReading {
    pub pit_id: EntityId,
    #[serde(flatten)]
    pub metrics: PitMetrics,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReading {
    pub device_id: EntityId,
    #[serde(flatten)]
    pub metrics: DeviceMetrics,
    pub recorded_at: DateTime<Utc>,
}
