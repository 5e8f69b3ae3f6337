//! Interval algebra over a day's free time.
//!
//! All ranges are half-open `[start, end)` in minutes since midnight and
//! tagged with their calendar date. Boundary equality counts as non-overlap.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// A contiguous free stretch of a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeInterval {
    pub date: NaiveDate,
    /// Minutes since midnight, inclusive.
    pub start: i64,
    /// Minutes since midnight, exclusive.
    pub end: i64,
}

impl FreeInterval {
    pub fn new(date: NaiveDate, start: i64, end: i64) -> Self {
        Self { date, start, end }
    }

    pub fn length(&self) -> i64 {
        self.end - self.start
    }

    /// Absolute UTC instant of the interval start.
    pub fn start_at(&self) -> DateTime<Utc> {
        minute_of_day_to_utc(self.date, self.start)
    }
}

/// Converts a (date, minutes-since-midnight) pair to an absolute UTC instant.
pub fn minute_of_day_to_utc(date: NaiveDate, minute: i64) -> DateTime<Utc> {
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"));
    midnight + Duration::minutes(minute)
}

/// How a blocked range `[block_start, block_end)` relates to a free range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Block entirely before or after the range; range survives unchanged.
    Disjoint,
    /// Block covers the whole range; range is eliminated.
    FullyCovered,
    /// Block covers the range start; `[block_end, range_end)` survives.
    TrimStart,
    /// Block covers the range end; `[range_start, block_start)` survives.
    TrimEnd,
    /// Block strictly inside the range; both sides survive.
    Split,
}

/// Classifies the overlap of a block against a free range. Exactly one of the
/// five cases applies to any pair of half-open ranges.
pub fn classify(range_start: i64, range_end: i64, block_start: i64, block_end: i64) -> Overlap {
    if block_end <= range_start || block_start >= range_end {
        Overlap::Disjoint
    } else if block_start <= range_start && block_end >= range_end {
        Overlap::FullyCovered
    } else if block_start <= range_start {
        Overlap::TrimStart
    } else if block_end >= range_end {
        Overlap::TrimEnd
    } else {
        Overlap::Split
    }
}

/// Removes `[block_start, block_end)` from every range, preserving date tags
/// and range order. Blocks must be applied one at a time: a later block may
/// fall inside a range produced by an earlier split.
pub fn subtract_block(ranges: Vec<FreeInterval>, block_start: i64, block_end: i64) -> Vec<FreeInterval> {
    let mut surviving = Vec::with_capacity(ranges.len());
    for range in ranges {
        match classify(range.start, range.end, block_start, block_end) {
            Overlap::Disjoint => surviving.push(range),
            Overlap::FullyCovered => {}
            Overlap::TrimStart => {
                surviving.push(FreeInterval::new(range.date, block_end, range.end));
            }
            Overlap::TrimEnd => {
                surviving.push(FreeInterval::new(range.date, range.start, block_start));
            }
            Overlap::Split => {
                surviving.push(FreeInterval::new(range.date, range.start, block_start));
                surviving.push(FreeInterval::new(range.date, block_end, range.end));
            }
        }
    }
    surviving
}

/// The free-interval pool for a whole planning horizon, ordered by
/// `(date, start)`. The allocator consumes it in place as sessions are placed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalPool {
    intervals: Vec<FreeInterval>,
}

impl IntervalPool {
    pub fn new(intervals: Vec<FreeInterval>) -> Self {
        Self { intervals }
    }

    pub fn intervals(&self) -> &[FreeInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Removes `[block_start, block_end)` from every interval on `date`.
    pub fn subtract_on(&mut self, date: NaiveDate, block_start: i64, block_end: i64) {
        let drained = std::mem::take(&mut self.intervals);
        self.intervals = drained
            .into_iter()
            .flat_map(|interval| {
                if interval.date == date {
                    subtract_block(vec![interval], block_start, block_end)
                } else {
                    vec![interval]
                }
            })
            .collect();
    }

    /// Whether some single interval on `date` fully contains `[start, end)`.
    pub fn covers(&self, date: NaiveDate, start: i64, end: i64) -> bool {
        self.intervals
            .iter()
            .any(|interval| interval.date == date && interval.start <= start && interval.end >= end)
    }

    /// The dates that still hold at least one interval, in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.intervals.iter().map(|interval| interval.date).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// First interval (pool order) that can host a session of
    /// `session_minutes` ending strictly before `deadline`, optionally
    /// restricted to one date.
    pub fn first_eligible(
        &self,
        date_filter: Option<NaiveDate>,
        session_minutes: i64,
        deadline: DateTime<Utc>,
    ) -> Option<FreeInterval> {
        self.intervals
            .iter()
            .filter(|interval| date_filter.is_none_or(|date| interval.date == date))
            .find(|interval| {
                interval.length() >= session_minutes
                    && interval.start_at() + Duration::minutes(session_minutes) < deadline
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    fn ranges(bounds: &[(i64, i64)]) -> Vec<FreeInterval> {
        bounds
            .iter()
            .map(|(start, end)| FreeInterval::new(day(), *start, *end))
            .collect()
    }

    #[test]
    fn classify_covers_all_five_cases() {
        // Range [540, 1020) = 09:00-17:00.
        assert_eq!(classify(540, 1020, 400, 540), Overlap::Disjoint);
        assert_eq!(classify(540, 1020, 1020, 1100), Overlap::Disjoint);
        assert_eq!(classify(540, 1020, 500, 1080), Overlap::FullyCovered);
        assert_eq!(classify(540, 1020, 540, 1020), Overlap::FullyCovered);
        assert_eq!(classify(540, 1020, 500, 600), Overlap::TrimStart);
        assert_eq!(classify(540, 1020, 540, 600), Overlap::TrimStart);
        assert_eq!(classify(540, 1020, 900, 1100), Overlap::TrimEnd);
        assert_eq!(classify(540, 1020, 900, 1020), Overlap::TrimEnd);
        assert_eq!(classify(540, 1020, 720, 780), Overlap::Split);
    }

    #[test]
    fn boundary_equality_is_non_overlap() {
        // Block ending exactly at range start, and starting exactly at range
        // end, leave the range untouched.
        let survived = subtract_block(ranges(&[(540, 1020)]), 480, 540);
        assert_eq!(survived, ranges(&[(540, 1020)]));
        let survived = subtract_block(ranges(&[(540, 1020)]), 1020, 1080);
        assert_eq!(survived, ranges(&[(540, 1020)]));
    }

    #[test]
    fn subtract_block_splits_interior_block() {
        let survived = subtract_block(ranges(&[(540, 1020)]), 720, 780);
        assert_eq!(survived, ranges(&[(540, 720), (780, 1020)]));
    }

    #[test]
    fn subtract_block_trims_edges() {
        let survived = subtract_block(ranges(&[(540, 1020)]), 500, 600);
        assert_eq!(survived, ranges(&[(600, 1020)]));
        let survived = subtract_block(ranges(&[(540, 1020)]), 960, 1100);
        assert_eq!(survived, ranges(&[(540, 960)]));
    }

    #[test]
    fn subtract_block_eliminates_covered_range() {
        let survived = subtract_block(ranges(&[(600, 660)]), 540, 720);
        assert!(survived.is_empty());
    }

    #[test]
    fn sequential_blocks_land_inside_earlier_splits() {
        // Second block falls inside a range produced by the first split.
        let mut pool = IntervalPool::new(ranges(&[(540, 1020)]));
        pool.subtract_on(day(), 720, 780);
        pool.subtract_on(day(), 840, 900);
        assert_eq!(
            pool.intervals(),
            ranges(&[(540, 720), (780, 840), (900, 1020)]).as_slice()
        );
    }

    #[test]
    fn subtract_on_only_touches_matching_date() {
        let other_day = NaiveDate::from_ymd_opt(2026, 3, 3).expect("valid date");
        let mut pool = IntervalPool::new(vec![
            FreeInterval::new(day(), 540, 1020),
            FreeInterval::new(other_day, 540, 1020),
        ]);
        pool.subtract_on(day(), 540, 1020);
        assert_eq!(pool.intervals(), &[FreeInterval::new(other_day, 540, 1020)]);
    }

    #[test]
    fn covers_requires_single_containing_interval() {
        let pool = IntervalPool::new(ranges(&[(540, 720), (780, 1020)]));
        assert!(pool.covers(day(), 600, 700));
        assert!(pool.covers(day(), 540, 720));
        // Spans the 720-780 gap.
        assert!(!pool.covers(day(), 700, 800));
        assert!(!pool.covers(NaiveDate::from_ymd_opt(2026, 3, 3).expect("valid date"), 600, 700));
    }

    #[test]
    fn first_eligible_respects_deadline() {
        let pool = IntervalPool::new(ranges(&[(540, 1020)]));
        let before = minute_of_day_to_utc(day(), 541);
        let after = minute_of_day_to_utc(day(), 700);
        assert!(pool.first_eligible(None, 60, before).is_none());
        assert_eq!(
            pool.first_eligible(None, 60, after),
            Some(FreeInterval::new(day(), 540, 1020))
        );
    }

    #[test]
    fn first_eligible_skips_short_intervals() {
        let pool = IntervalPool::new(ranges(&[(540, 570), (600, 720)]));
        let deadline = minute_of_day_to_utc(day(), 1440);
        assert_eq!(
            pool.first_eligible(None, 60, deadline),
            Some(FreeInterval::new(day(), 600, 720))
        );
    }

    proptest! {
        #[test]
        fn subtraction_never_increases_total_length(
            range_start in 0i64..1380,
            range_len in 1i64..600,
            block_start in 0i64..1440,
            block_len in 1i64..600,
        ) {
            let range_end = (range_start + range_len).min(1440);
            let block_end = (block_start + block_len).min(1440);
            let before = range_end - range_start;
            let survived = subtract_block(
                vec![FreeInterval::new(day(), range_start, range_end)],
                block_start,
                block_end,
            );
            let after: i64 = survived.iter().map(FreeInterval::length).sum();
            prop_assert!(after <= before);
            // Survivors never intersect the block and stay inside the range.
            for interval in &survived {
                prop_assert!(interval.start >= range_start && interval.end <= range_end);
                prop_assert!(interval.end <= block_start || interval.start >= block_end);
                prop_assert!(interval.start < interval.end);
            }
        }

        #[test]
        fn classification_is_exhaustive_and_consistent(
            range_start in 0i64..1380,
            range_len in 1i64..600,
            block_start in 0i64..1440,
            block_len in 1i64..600,
        ) {
            let range_end = (range_start + range_len).min(1440);
            let block_end = (block_start + block_len).min(1440);
            let case = classify(range_start, range_end, block_start, block_end);
            let survived = subtract_block(
                vec![FreeInterval::new(day(), range_start, range_end)],
                block_start,
                block_end,
            );
            let expected_pieces = match case {
                Overlap::Disjoint => 1,
                Overlap::FullyCovered => 0,
                Overlap::TrimStart | Overlap::TrimEnd => 1,
                Overlap::Split => 2,
            };
            prop_assert_eq!(survived.len(), expected_pieces);
        }
    }
}
