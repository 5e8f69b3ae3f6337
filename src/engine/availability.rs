//! Free-time computation for the planning horizon.
//!
//! For each work day between "now" and the furthest pending deadline, seeds
//! the working-hour window and subtracts every applicable routine block and
//! every committed time slot, then discards remainders too short to be
//! usable.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::models::{time_to_minutes, RoutineBlock, TimeSlot, UserPreference};
use crate::engine::interval::{FreeInterval, IntervalPool};

/// Horizon length when the user has no pending tasks.
const DEFAULT_HORIZON_DAYS: i64 = 14;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Last day of the planning horizon: the furthest pending deadline, or two
/// weeks out when nothing is pending.
pub fn schedule_end_date(deadlines: &[DateTime<Utc>], now: DateTime<Utc>) -> NaiveDate {
    match deadlines.iter().map(|deadline| deadline.date_naive()).max() {
        Some(furthest) => furthest.max(now.date_naive()),
        None => now.date_naive() + Duration::days(DEFAULT_HORIZON_DAYS),
    }
}

/// Number of work days in `[start_date, end_date]`, at least 1.
pub fn work_days_between(
    preference: &UserPreference,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> i64 {
    let mut count = 0;
    let mut current = start_date;
    while current <= end_date {
        if preference.is_work_day(current) {
            count += 1;
        }
        current += Duration::days(1);
    }
    count.max(1)
}

/// Builds the free-interval pool for the horizon `[now, horizon_end]`.
///
/// Today's window starts no earlier than `now` so a re-run never offers time
/// that has already elapsed. Non-work days contribute nothing. Remainders
/// shorter than the preference's break duration are dropped.
pub fn compute_free_intervals(
    now: DateTime<Utc>,
    horizon_end: NaiveDate,
    preference: &UserPreference,
    routines: &[RoutineBlock],
    committed: &[TimeSlot],
) -> IntervalPool {
    let work_start = time_to_minutes(&preference.working_hours.start).unwrap_or(9 * 60);
    let work_end = time_to_minutes(&preference.working_hours.end).unwrap_or(17 * 60);

    let today = now.date_naive();
    // Rounded up so today's window never starts before `now`; a slot placed
    // at the window start must count as future on the next clear pass.
    let minutes_now = minutes_of_day_ceil(now, today);

    let mut pool = Vec::new();
    let mut current = today;
    while current <= horizon_end {
        if !preference.is_work_day(current) {
            current += Duration::days(1);
            continue;
        }

        let day_start = if current == today {
            work_start.max(minutes_now)
        } else {
            work_start
        };
        if day_start >= work_end {
            current += Duration::days(1);
            continue;
        }

        let mut day_ranges = vec![FreeInterval::new(current, day_start, work_end)];

        // Blocks are applied one at a time; pre-merging would miss blocks
        // that land inside ranges produced by earlier splits.
        for routine in routines {
            if !routine.applies_on(current) {
                continue;
            }
            let (Some(block_start), Some(block_end)) = (
                time_to_minutes(&routine.start_time),
                time_to_minutes(&routine.end_time),
            ) else {
                continue;
            };
            day_ranges = super::interval::subtract_block(day_ranges, block_start, block_end);
        }

        // Clamping to the day's bounds handles slots spanning midnight: each
        // overlapped day loses its own portion.
        for slot in committed {
            let slot_start = minutes_of_day(slot.start_time, current);
            let slot_end = minutes_of_day_ceil(slot.end_time, current);
            if slot_end <= slot_start {
                continue;
            }
            day_ranges = super::interval::subtract_block(day_ranges, slot_start, slot_end);
        }

        day_ranges.retain(|range| range.length() >= preference.break_duration);
        pool.extend(day_ranges);

        current += Duration::days(1);
    }

    IntervalPool::new(pool)
}

/// Minutes since midnight of `date` for an absolute instant, rounded down.
/// Instants outside `date` clamp to its bounds.
fn minutes_of_day(instant: DateTime<Utc>, date: NaiveDate) -> i64 {
    let midnight = super::interval::minute_of_day_to_utc(date, 0);
    ((instant - midnight).num_minutes()).clamp(0, MINUTES_PER_DAY)
}

/// Like `minutes_of_day` but rounds partial minutes up, for the blocked side
/// of a boundary.
fn minutes_of_day_ceil(instant: DateTime<Utc>, date: NaiveDate) -> i64 {
    let midnight = super::interval::minute_of_day_to_utc(date, 0);
    let seconds = (instant - midnight).num_seconds();
    (seconds + 59).div_euclid(60).clamp(0, MINUTES_PER_DAY)
}
