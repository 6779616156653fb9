// Alarm records and the random alarm emitter

mod emitter;

pub use emitter::{maybe_alarm, SOURCE_POOL_SIZE};

use crate::entity::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Persisted alarm event, broadcast to subscribers as the `alarm` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: i64,
    pub level: AlarmLevel,
    #[serde(rename = "type")]
    pub category: AlarmCategory,
    /// Free-form reference to the originating entity (e.g. "pit-A-7")
    pub source: String,
    pub message: String,
    pub status: AlarmStatus,
    pub created_at: DateTime<Utc>,
}

/// Alarm payload before the store assigns an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAlarm {
    pub level: AlarmLevel,
    pub category: AlarmCategory,
    pub source: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewAlarm {
    /// Attach the storage id. New alarms always start `active`.
    pub fn into_alarm(self, id: i64) -> Alarm {
        Alarm {
            id,
            level: self.level,
            category: self.category,
            source: self.source,
            message: self.message,
            status: AlarmStatus::Active,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlarmLevel {
    pub const ALL: [AlarmLevel; 4] = [
        AlarmLevel::Info,
        AlarmLevel::Warning,
        AlarmLevel::Error,
        AlarmLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmLevel::Info => "info",
            AlarmLevel::Warning => "warning",
            AlarmLevel::Error => "error",
            AlarmLevel::Critical => "critical",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmCategory {
    Temperature,
    Humidity,
    Ph,
    Device,
    System,
}

impl AlarmCategory {
    pub const ALL: [AlarmCategory; 5] = [
        AlarmCategory::Temperature,
        AlarmCategory::Humidity,
        AlarmCategory::Ph,
        AlarmCategory::Device,
        AlarmCategory::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmCategory::Temperature => "temperature",
            AlarmCategory::Humidity => "humidity",
            AlarmCategory::Ph => "ph",
            AlarmCategory::Device => "device",
            AlarmCategory::System => "system",
        }
    }

    /// Message template paired with each category
    pub fn message(&self) -> &'static str {
        match self {
            AlarmCategory::Temperature => "Temperature above upper threshold",
            AlarmCategory::Humidity => "Abnormal humidity fluctuation",
            AlarmCategory::Ph => "pH value out of normal range",
            AlarmCategory::Device => "Excessive device vibration",
            AlarmCategory::System => "System communication latency",
        }
    }
}

/// Lifecycle state. Only `Active` is produced here; acknowledgement and
/// resolution belong to the alarm workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlarmStatus {
    pub const ALL: [AlarmStatus; 3] = [
        AlarmStatus::Active,
        AlarmStatus::Acknowledged,
        AlarmStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmStatus::Active => "active",
            AlarmStatus::Acknowledged => "acknowledged",
            AlarmStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for AlarmLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlarmLevel::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for AlarmCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlarmCategory::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for AlarmStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlarmStatus::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_serializes_category_as_type() {
        let alarm = NewAlarm {
            level: AlarmLevel::Critical,
            category: AlarmCategory::Ph,
            source: "pit-A-3".to_string(),
            message: AlarmCategory::Ph.message().to_string(),
            created_at: Utc::now(),
        }
        .into_alarm(7);

        let json = serde_json::to_value(&alarm).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["level"], "critical");
        assert_eq!(json["type"], "ph");
        assert_eq!(json["source"], "pit-A-3");
        assert_eq!(json["status"], "active");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_enum_strings_parse_back() {
        for level in AlarmLevel::ALL {
            assert_eq!(level.as_str().parse::<AlarmLevel>().unwrap(), level);
        }
        for category in AlarmCategory::ALL {
            assert_eq!(category.as_str().parse::<AlarmCategory>().unwrap(), category);
        }
        for status in AlarmStatus::ALL {
            assert_eq!(status.as_str().parse::<AlarmStatus>().unwrap(), status);
        }
        assert!("fatal".parse::<AlarmLevel>().is_err());
    }
}
