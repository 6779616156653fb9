use super::Store;
use crate::config::SeedConfig;
use crate::entity::{DeviceStatus, NewDevice, NewPit, PitStatus};
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

const ZONES: [&str; 4] = ["A", "B", "C", "D"];
const GRID_SIZE: u32 = 5;
const GRAIN_TYPES: [&str; 2] = ["sorghum", "wheat"];
const DEVICE_TYPES: [&str; 5] = ["pump", "motor", "sensor", "robot", "conveyor"];
const LOCATIONS: [&str; 5] = ["Zone A", "Zone B", "Zone C", "Zone D", "Control room"];

/// What a seeding run created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub pits: usize,
    pub devices: usize,
}

/// Populate an empty store with demo pits and devices.
///
/// Pits fill zones A..D in order, each a 5x5 grid, so at most 100 pits are
/// created. Does nothing when the store already holds pits.
pub fn seed_demo_data<R: Rng + ?Sized>(
    store: &dyn Store,
    config: &SeedConfig,
    rng: &mut R,
) -> Result<SeedReport> {
    let existing = store.list_pits().context("Failed to check existing pits")?;
    if !existing.is_empty() {
        info!(pits = existing.len(), "Store already has data, skipping seed");
        return Ok(SeedReport::default());
    }

    let mut report = SeedReport::default();

    'zones: for zone in ZONES {
        for row in 1..=GRID_SIZE {
            for col in 1..=GRID_SIZE {
                if report.pits >= config.total_pits {
                    break 'zones;
                }
                let pit = NewPit {
                    pit_no: format!("{}-{:03}", zone, report.pits + 1),
                    zone: zone.to_string(),
                    row,
                    col,
                    status: PitStatus::Normal,
                    pit_age: rng.gen_range(10..110),
                    fermentation_day: rng.gen_range(0..60),
                    grain_type: pick(rng, &GRAIN_TYPES).to_string(),
                };
                store.insert_pit(&pit)?;
                report.pits += 1;
            }
        }
    }

    for n in 1..=config.total_devices {
        let device_type = pick(rng, &DEVICE_TYPES);
        let initial = device_type[..1].to_uppercase();
        let device = NewDevice {
            device_no: format!("{}-{:03}", initial, n),
            name: format!("{}-{}", device_type, n),
            device_type: device_type.to_string(),
            location: pick(rng, &LOCATIONS).to_string(),
            status: DeviceStatus::Running,
            running_hours: f64::from(rng.gen_range(0u32..10_000)),
        };
        store.insert_device(&device)?;
        report.devices += 1;
    }

    info!(
        pits = report.pits,
        devices = report.devices,
        "Demo data seeded"
    );
    Ok(report)
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}
