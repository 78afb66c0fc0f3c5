use chrono::{Duration, NaiveTime};
use serde::Serialize;

use crate::models::time_range::format_clock;
use crate::models::{DayPart, TimeRange};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("duration must be a positive number of minutes")]
    NotPositive,

    #[error("duration must not exceed {max} minutes")]
    TooLong { max: u32 },
}

/// Maps selected bucket ids to their fixed ranges, in bucket declaration
/// order regardless of the order they were picked.
pub fn derive_ranges_from_buckets<S: AsRef<str>>(bucket_ids: &[S]) -> Vec<TimeRange> {
    let mut selected: Vec<DayPart> = Vec::new();
    for id in bucket_ids {
        match DayPart::parse(id.as_ref()) {
            Some(part) => selected.push(part),
            None => tracing::debug!(bucket = id.as_ref(), "ignoring unknown day-part bucket"),
        }
    }
    DayPart::ALL
        .iter()
        .filter(|part| selected.contains(part))
        .map(|part| part.range())
        .collect()
}

/// Appends custom ranges after the bucket-derived ones, dropping any custom
/// range that exactly reproduces a range already in the result.
pub fn merge_with_custom_ranges(predefined: &[TimeRange], custom: &[TimeRange]) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = predefined.to_vec();
    for range in custom {
        if !merged.contains(range) {
            merged.push(*range);
        }
    }
    merged
}

/// Custom ranges that are not already represented by a selected bucket.
pub fn custom_only(predefined: &[TimeRange], custom: &[TimeRange]) -> Vec<TimeRange> {
    let mut kept: Vec<TimeRange> = Vec::new();
    for range in custom {
        if !predefined.contains(range) && !kept.contains(range) {
            kept.push(*range);
        }
    }
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeOverlap {
    pub first: TimeRange,
    pub second: TimeRange,
}

/// Pairs of distinct ranges that share at least one minute of the day.
pub fn find_overlaps(ranges: &[TimeRange]) -> Vec<RangeOverlap> {
    let mut overlaps = Vec::new();
    for (i, first) in ranges.iter().enumerate() {
        for second in &ranges[i + 1..] {
            if first != second && first.overlaps(second) {
                overlaps.push(RangeOverlap {
                    first: *first,
                    second: *second,
                });
            }
        }
    }
    overlaps
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndTime {
    pub time: NaiveTime,
    pub crosses_midnight: bool,
}

impl EndTime {
    pub fn display(&self) -> String {
        format_clock(self.time)
    }
}

/// Adds `duration_minutes` to `start` on a 24-hour clock.
pub fn compute_end_time(start: NaiveTime, duration_minutes: u32) -> EndTime {
    let (time, wrapped_secs) =
        start.overflowing_add_signed(Duration::minutes(i64::from(duration_minutes)));
    EndTime {
        time,
        crosses_midnight: wrapped_secs != 0,
    }
}

pub fn validate_duration(duration_minutes: i64, max_minutes: u32) -> Result<u32, DurationError> {
    if duration_minutes <= 0 {
        return Err(DurationError::NotPositive);
    }
    if duration_minutes > i64::from(max_minutes) {
        return Err(DurationError::TooLong { max: max_minutes });
    }
    Ok(duration_minutes as u32)
}

/// `"09:00–10:30"` for a start time and duration.
pub fn display_range(start: NaiveTime, duration_minutes: u32) -> String {
    let end = compute_end_time(start, duration_minutes);
    format!("{}–{}", format_clock(start), end.display())
}
