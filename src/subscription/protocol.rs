use crate::entity::{DeviceStatus, EntityId, PitStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Server → Client message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PitData,
    DeviceData,
    Alarm,
}

/// Server → Client envelope: `{"type", "data", "timestamp"}`
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage<T> {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> RealtimeMessage<T> {
    pub fn new(msg_type: MessageType, data: T) -> Self {
        Self::at(msg_type, data, Utc::now())
    }

    pub fn at(msg_type: MessageType, data: T, timestamp: DateTime<Utc>) -> Self {
        Self {
            msg_type,
            data,
            timestamp,
        }
    }
}

/// Per-pit entry of a `pit_data` batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PitSummary {
    pub pit_id: EntityId,
    pub pit_no: String,
    pub temperature: f64,
    pub humidity: f64,
    pub ph_value: f64,
    pub status: PitStatus,
}

/// Per-device entry of a `device_data` batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device_id: EntityId,
    pub device_no: String,
    pub power: f64,
    pub temperature: f64,
    pub vibration: f64,
    pub status: DeviceStatus,
}
