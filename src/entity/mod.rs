use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;


/// Storage-assigned identifier for pits and devices.
pub type EntityId = i64;

/// Fermentation pit, owned by the CRUD layer.
///
/// The simulator only reads pits and proposes status transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pit {
    pub id: EntityId,
    /// External code, e.g. "A-001"
    pub pit_no: String,
    pub zone: String,
    pub row: u32,
    pub col: u32,
    pub status: PitStatus,
    /// Pit age in years
    pub pit_age: u32,
    pub fermentation_day: u32,
    pub grain_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plant device (pump, motor, conveyor, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: EntityId,
    /// External code, e.g. "P-001"
    pub device_no: String,
    pub name: String,
    pub device_type: String,
    pub location: String,
    pub status: DeviceStatus,
    pub running_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a pit (id and timestamps assigned by the store).
#[derive(Clone, Debug)]
pub struct NewPit {
    pub pit_no: String,
    pub zone: String,
    pub row: u32,
    pub col: u32,
    pub status: PitStatus,
    pub pit_age: u32,
    pub fermentation_day: u32,
    pub grain_type: String,
}

/// Fields for creating a device (id and timestamps assigned by the store).
#[derive(Clone, Debug)]
pub struct NewDevice {
    pub device_no: String,
    pub name: String,
    pub device_type: String,
    pub location: String,
    pub status: DeviceStatus,
    pub running_hours: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitStatus {
    Normal,
    Warning,
    Alarm,
}

impl PitStatus {
    pub const ALL: [PitStatus; 3] = [PitStatus::Normal, PitStatus::Warning, PitStatus::Alarm];

    pub fn as_str(&self) -> &'static str {
        match self {
            PitStatus::Normal => "normal",
            PitStatus::Warning => "warning",
            PitStatus::Alarm => "alarm",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Running,
    Warning,
    Fault,
    Stopped,
    Maintenance,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 5] = [
        DeviceStatus::Running,
        DeviceStatus::Warning,
        DeviceStatus::Fault,
        DeviceStatus::Stopped,
        DeviceStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Running => "running",
            DeviceStatus::Warning => "warning",
            DeviceStatus::Fault => "fault",
            DeviceStatus::Stopped => "stopped",
            DeviceStatus::Maintenance => "maintenance",
        }
    }

    /// Only running and warning devices produce telemetry.
    pub fn is_active(&self) -> bool {
        matches!(self, DeviceStatus::Running | DeviceStatus::Warning)
    }
}

/// Error returned when parsing an unrecognized enum string (statuses, alarm fields)
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for PitStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PitStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for DeviceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for PitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
