use crate::entity::{DeviceStatus, PitStatus};
use crate::reading::{DeviceMetrics, PitMetrics};

/// Pit temperature above which the pit is in alarm (strictly greater)
pub const PIT_ALARM_TEMPERATURE: f64 = 40.0;
/// Pit temperature above which the pit is in warning (strictly greater)
pub const PIT_WARNING_TEMPERATURE: f64 = 35.0;

pub const DEVICE_FAULT_VIBRATION: f64 = 8.0;
pub const DEVICE_FAULT_TEMPERATURE: f64 = 80.0;
pub const DEVICE_WARNING_VIBRATION: f64 = 5.0;
pub const DEVICE_WARNING_TEMPERATURE: f64 = 65.0;

/// Result of a status evaluation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition<S> {
    pub status: S,
    /// True when `status` differs from the previous status and must be written back
    pub changed: bool,
}

impl<S: PartialEq + Copy> Transition<S> {
    fn from_previous(previous: S, status: S) -> Self {
        Self {
            status,
            changed: status != previous,
        }
    }
}

/// Next pit status. Only temperature gates the status.
pub fn next_pit_status(metrics: &PitMetrics, previous: PitStatus) -> Transition<PitStatus> {
    let status = if metrics.temperature > PIT_ALARM_TEMPERATURE {
        PitStatus::Alarm
    } else if metrics.temperature > PIT_WARNING_TEMPERATURE {
        PitStatus::Warning
    } else {
        PitStatus::Normal
    };

    Transition::from_previous(previous, status)
}

/// Next device status from vibration and temperature.
///
/// Callers only evaluate active (running/warning) devices; the result is one
/// of running, warning or fault regardless of `previous`.
pub fn next_device_status(
    metrics: &DeviceMetrics,
    previous: DeviceStatus,
) -> Transition<DeviceStatus> {
    let status = if metrics.vibration > DEVICE_FAULT_VIBRATION
        || metrics.temperature > DEVICE_FAULT_TEMPERATURE
    {
        DeviceStatus::Fault
    } else if metrics.vibration > DEVICE_WARNING_VIBRATION
        || metrics.temperature > DEVICE_WARNING_TEMPERATURE
    {
        DeviceStatus::Warning
    } else {
        DeviceStatus::Running
    };

    Transition::from_previous(previous, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pit(temperature: f64) -> PitMetrics {
        PitMetrics {
            temperature,
            humidity: 70.0,
            ph_value: 4.5,
            acidity: 1.0,
            moisture: 55.0,
            alcohol: 5.0,
        }
    }

    fn device(vibration: f64, temperature: f64) -> DeviceMetrics {
        DeviceMetrics {
            power: 15.0,
            speed: 1400.0,
            vibration,
            temperature,
            current: 5.0,
        }
    }

    #[test]
    fn test_pit_thresholds() {
        assert_eq!(next_pit_status(&pit(25.0), PitStatus::Normal).status, PitStatus::Normal);
        assert_eq!(next_pit_status(&pit(36.0), PitStatus::Normal).status, PitStatus::Warning);
        assert_eq!(next_pit_status(&pit(41.0), PitStatus::Normal).status, PitStatus::Alarm);
    }

    #[test]
    fn test_pit_boundaries_are_strict() {
        // exactly 40 is not alarm, exactly 35 is not warning
        assert_eq!(next_pit_status(&pit(40.0), PitStatus::Normal).status, PitStatus::Warning);
        assert_eq!(next_pit_status(&pit(35.0), PitStatus::Warning).status, PitStatus::Normal);
        assert_eq!(next_pit_status(&pit(40.01), PitStatus::Normal).status, PitStatus::Alarm);
        assert_eq!(next_pit_status(&pit(35.01), PitStatus::Normal).status, PitStatus::Warning);
    }

    #[test]
    fn test_pit_ignores_other_metrics() {
        let mut metrics = pit(20.0);
        metrics.humidity = 95.0;
        metrics.ph_value = 3.0;
        metrics.alcohol = 20.0;
        assert_eq!(next_pit_status(&metrics, PitStatus::Alarm).status, PitStatus::Normal);
    }

    #[test]
    fn test_pit_changed_flag() {
        let same = next_pit_status(&pit(36.0), PitStatus::Warning);
        assert!(!same.changed);

        let moved = next_pit_status(&pit(41.0), PitStatus::Normal);
        assert!(moved.changed);
        assert_eq!(moved.status, PitStatus::Alarm);
    }

    #[test]
    fn test_pit_is_deterministic() {
        for previous in PitStatus::ALL {
            for t in [15.0, 35.0, 35.5, 40.0, 40.5, 45.0] {
                assert_eq!(
                    next_pit_status(&pit(t), previous),
                    next_pit_status(&pit(t), previous)
                );
            }
        }
    }

    #[test]
    fn test_device_thresholds() {
        let running = DeviceStatus::Running;
        assert_eq!(next_device_status(&device(1.0, 45.0), running).status, DeviceStatus::Running);
        assert_eq!(next_device_status(&device(5.5, 45.0), running).status, DeviceStatus::Warning);
        assert_eq!(next_device_status(&device(1.0, 66.0), running).status, DeviceStatus::Warning);
        assert_eq!(next_device_status(&device(8.5, 45.0), running).status, DeviceStatus::Fault);
        assert_eq!(next_device_status(&device(1.0, 81.0), running).status, DeviceStatus::Fault);
    }

    #[test]
    fn test_device_boundaries_are_strict() {
        let running = DeviceStatus::Running;
        assert_eq!(next_device_status(&device(8.0, 45.0), running).status, DeviceStatus::Warning);
        assert_eq!(next_device_status(&device(1.0, 80.0), running).status, DeviceStatus::Warning);
        assert_eq!(next_device_status(&device(5.0, 65.0), running).status, DeviceStatus::Running);
    }

    #[test]
    fn test_device_fault_wins_over_warning() {
        let t = next_device_status(&device(6.0, 90.0), DeviceStatus::Warning);
        assert_eq!(t.status, DeviceStatus::Fault);
        assert!(t.changed);
    }

    #[test]
    fn test_device_recovers_from_warning() {
        let t = next_device_status(&device(1.0, 45.0), DeviceStatus::Warning);
        assert_eq!(t.status, DeviceStatus::Running);
        assert!(t.changed);
    }
}
