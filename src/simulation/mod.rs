// Periodic simulation of pit and device telemetry

pub mod driver;
pub mod metrics;
pub mod status;
pub mod walk;

pub use driver::{run_simulator, Simulator, SimulatorDeps, TickReport};
pub use metrics::{SimulatorMetrics, SimulatorMetricsSnapshot};
pub use walk::WalkParams;
