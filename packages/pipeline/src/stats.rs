//! Event history statistics used by the period and frequency filters.

use chrono::{DateTime, TimeDelta, Utc};

/// Length of an average Gregorian month (30.436875 days) in milliseconds.
///
/// Months are converted to a fixed duration; the window is approximate.
pub const AVERAGE_MONTH_MS: i64 = 2_629_746_000;

const DAY_MS: f64 = 86_400_000.0;

/// Average number of days between consecutive events.
///
/// The input is sorted first, so any order is accepted. Returns `None` when
/// there are fewer than two events, since no gap exists to average.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn event_frequency(datetimes: &[DateTime<Utc>]) -> Option<f64> {
    if datetimes.len() < 2 {
        return None;
    }

    let mut sorted = datetimes.to_vec();
    sorted.sort_unstable();

    let total_ms: i64 = sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds())
        .sum();
    let gaps = (sorted.len() - 1) as f64;

    Some(total_ms as f64 / DAY_MS / gaps)
}

/// Number of events strictly after `now - period_months`.
#[must_use]
pub fn number_in_period(datetimes: &[DateTime<Utc>], period_months: u32) -> u64 {
    number_in_period_at(datetimes, period_months, Utc::now())
}

/// [`number_in_period`] against an explicit "now".
///
/// A window reaching past the earliest representable instant counts every
/// event.
#[must_use]
pub fn number_in_period_at(
    datetimes: &[DateTime<Utc>],
    period_months: u32,
    now: DateTime<Utc>,
) -> u64 {
    let cutoff = i64::from(period_months)
        .checked_mul(AVERAGE_MONTH_MS)
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|window| now.checked_sub_signed(window));

    match cutoff {
        Some(cutoff) => datetimes.iter().filter(|dt| **dt > cutoff).count() as u64,
        None => datetimes.len() as u64,
    }
}
