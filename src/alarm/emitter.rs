use super::{AlarmCategory, AlarmLevel, NewAlarm};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

/// Synthetic sources are drawn from "pit-A-1" ..= "pit-A-{SOURCE_POOL_SIZE}"
pub const SOURCE_POOL_SIZE: u32 = 20;

/// Roll the per-tick alarm gate.
///
/// Returns a new alarm with probability `probability` (clamped to `[0, 1]`,
/// NaN counts as 0), otherwise `None`. Level and category are chosen independently and
/// uniformly; the message always matches the category. No state is carried
/// between calls.
pub fn maybe_alarm<R: Rng + ?Sized>(
    rng: &mut R,
    probability: f64,
    now: DateTime<Utc>,
) -> Option<NewAlarm> {
    if probability.is_nan() {
        return None;
    }
    let probability = probability.clamp(0.0, 1.0);
    if rng.gen::<f64>() >= probability {
        return None;
    }

    let level = *AlarmLevel::ALL.choose(rng)?;
    let category = *AlarmCategory::ALL.choose(rng)?;
    let source = format!("pit-A-{}", rng.gen_range(1..=SOURCE_POOL_SIZE));

    Some(NewAlarm {
        level,
        category,
        source,
        message: category.message().to_string(),
        created_at: now,
    })
}
