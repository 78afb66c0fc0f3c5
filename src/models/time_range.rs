use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeRangeError {
    #[error("invalid time: {0} (expected HH:MM)")]
    InvalidTime(String),

    #[error("time range {start}-{end} is empty")]
    Empty { start: String, end: String },

    #[error("time range {start}-{end} ends before it starts")]
    EndsBeforeStart { start: String, end: String },
}

/// Parses `HH:MM` or the backend's `HH:MM:SS`, dropping seconds.
pub fn parse_clock(s: &str) -> Result<NaiveTime, TimeRangeError> {
    let s = s.trim();
    let parsed = NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| TimeRangeError::InvalidTime(s.to_string()))?;
    parsed
        .with_second(0)
        .ok_or_else(|| TimeRangeError::InvalidTime(s.to_string()))
}

pub fn format_clock(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Serde adapter writing `HH:MM` and reading `HH:MM` or `HH:MM:SS`.
pub mod serde_clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_clock(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_clock(&raw).map_err(serde::de::Error::custom)
    }
}

pub mod serde_clock_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => s.serialize_str(&super::format_clock(*t)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| super::parse_clock(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// The four named windows offered as a shorthand for a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Overnight,
}

impl DayPart {
    pub const ALL: [DayPart; 4] = [
        DayPart::Morning,
        DayPart::Afternoon,
        DayPart::Evening,
        DayPart::Overnight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayPart::Morning => "morning",
            DayPart::Afternoon => "afternoon",
            DayPart::Evening => "evening",
            DayPart::Overnight => "overnight",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Some(DayPart::Morning),
            "afternoon" => Some(DayPart::Afternoon),
            "evening" => Some(DayPart::Evening),
            "overnight" => Some(DayPart::Overnight),
            _ => None,
        }
    }

    pub fn range(&self) -> TimeRange {
        let (start, end) = match self {
            DayPart::Morning => (clock(6, 0), clock(12, 0)),
            DayPart::Afternoon => (clock(12, 0), clock(18, 0)),
            DayPart::Evening => (clock(18, 0), clock(22, 0)),
            DayPart::Overnight => (clock(22, 0), clock(6, 0)),
        };
        TimeRange { start, end }
    }
}

/// Half-open window `[start, end)` on a 24-hour clock.
///
/// Only the overnight bucket may have `end < start`; it is read as crossing
/// midnight into the next day. Equality is structural, so a bucket-derived
/// range and a hand-drawn one with the same bounds compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange", into = "RawTimeRange")]
pub struct TimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, TimeRangeError> {
        let range = TimeRange { start, end };
        if start == end {
            return Err(TimeRangeError::Empty {
                start: format_clock(start),
                end: format_clock(end),
            });
        }
        if end < start && range != DayPart::Overnight.range() {
            return Err(TimeRangeError::EndsBeforeStart {
                start: format_clock(start),
                end: format_clock(end),
            });
        }
        Ok(range)
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, TimeRangeError> {
        Self::new(parse_clock(start)?, parse_clock(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end < self.start
    }

    pub fn duration_minutes(&self) -> u32 {
        let start = minute_of_day(self.start);
        let end = minute_of_day(self.end);
        if self.crosses_midnight() {
            MINUTES_PER_DAY - start + end
        } else {
            end - start
        }
    }

    /// Minute-of-day intervals covered by this range, split at midnight.
    pub fn segments(&self) -> Vec<(u32, u32)> {
        let start = minute_of_day(self.start);
        let end = minute_of_day(self.end);
        if self.crosses_midnight() {
            vec![(start, MINUTES_PER_DAY), (0, end)]
        } else {
            vec![(start, end)]
        }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.segments().iter().any(|(a_start, a_end)| {
            other
                .segments()
                .iter()
                .any(|(b_start, b_end)| a_start < b_end && b_start < a_end)
        })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{}", format_clock(self.start), format_clock(self.end))
    }
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTimeRange {
    start: String,
    end: String,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = TimeRangeError;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        TimeRange::parse(&raw.start, &raw.end)
    }
}

impl From<TimeRange> for RawTimeRange {
    fn from(range: TimeRange) -> Self {
        RawTimeRange {
            start: format_clock(range.start),
            end: format_clock(range.end),
        }
    }
}
