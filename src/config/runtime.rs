use super::SimulatorConfig;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Runtime-configurable simulator knobs. Changes via PUT /api/admin/simulator
/// take effect on the next tick without restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub simulator_enabled: bool,
    pub alarm_probability: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_config(&SimulatorConfig::default())
    }
}

impl RuntimeConfig {
    /// Initial values from the file configuration
    pub fn from_config(simulator: &SimulatorConfig) -> Self {
        Self {
            simulator_enabled: simulator.enabled,
            alarm_probability: simulator.alarm_probability,
        }
    }

    /// Apply env var overrides on top of the current values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("BREWTWIN_SIMULATOR_ENABLED") {
            if let Ok(b) = v.parse::<bool>() {
                self.simulator_enabled = b;
            }
        }
        if let Ok(v) = std::env::var("BREWTWIN_ALARM_PROBABILITY") {
            if let Ok(p) = v.parse::<f64>() {
                if (0.0..=1.0).contains(&p) {
                    self.alarm_probability = p;
                }
            }
        }
        self
    }
}

pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

pub fn new_runtime_config(simulator: &SimulatorConfig) -> SharedRuntimeConfig {
    Arc::new(RwLock::new(
        RuntimeConfig::from_config(simulator).with_env_overrides(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let simulator = SimulatorConfig {
            enabled: false,
            alarm_probability: 0.2,
            ..SimulatorConfig::default()
        };
        let cfg = RuntimeConfig::from_config(&simulator);
        assert!(!cfg.simulator_enabled);
        assert_eq!(cfg.alarm_probability, 0.2);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(RuntimeConfig::default()).unwrap();
        assert_eq!(json["simulatorEnabled"], true);
        assert_eq!(json["alarmProbability"], 0.05);
    }
}
