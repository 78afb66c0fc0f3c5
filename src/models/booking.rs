use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::time_range::{serde_clock, serde_clock_opt};
use crate::models::TimeRange;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Immediate,
    Schedule,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Immediate => "immediate",
            BookingType::Schedule => "schedule",
        }
    }
}

/// How long an immediate hire runs: a fixed date window, or a number of
/// weeks repeating on the selected working days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DurationSpec {
    DateRange {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Weekly {
        weeks: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Weekdays this task is limited to. Empty means any working day.
    #[serde(default)]
    pub days: Vec<Weekday>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleDetails {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "serde_clock_opt")]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImmediateDetails {
    #[serde(default)]
    pub work_location: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<u64>,
    #[serde(default)]
    pub working_days: Vec<Weekday>,
    #[serde(default)]
    pub buckets: Vec<String>,
    #[serde(default)]
    pub custom_ranges: Vec<TimeRange>,
    #[serde(default)]
    pub duration: Option<DurationSpec>,
    #[serde(default)]
    pub tasks: Vec<TaskDraft>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingDraft {
    pub elderly_profile_ids: Vec<String>,
    pub booking_type: Option<BookingType>,
    pub schedule: ScheduleDetails,
    pub immediate: ImmediateDetails,
}

/// A working day of the distributed schedule. `date` is set for date-range
/// bookings, otherwise the entry repeats every `weekday`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledDay {
    pub weekday: Weekday,
    pub date: Option<NaiveDate>,
    pub ranges: Vec<TimeRange>,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkSchedule {
    pub days: Vec<ScheduledDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRequest {
    pub date: NaiveDate,
    #[serde(with = "serde_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "serde_clock")]
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImmediateRequest {
    pub work_location: String,
    pub hourly_rate: u64,
    pub working_days: Vec<Weekday>,
    pub time_ranges: Vec<TimeRange>,
    pub duration: DurationSpec,
    pub tasks: Vec<TaskDraft>,
    pub schedule: WorkSchedule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "booking_type", rename_all = "snake_case")]
pub enum BookingRequestDetails {
    Immediate(ImmediateRequest),
    Schedule(ScheduleRequest),
}

/// Final payload handed to the backend once the wizard completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRequest {
    pub elderly_profile_ids: Vec<String>,
    #[serde(flatten)]
    pub details: BookingRequestDetails,
}

impl BookingRequest {
    pub fn booking_type(&self) -> BookingType {
        match self.details {
            BookingRequestDetails::Immediate(_) => BookingType::Immediate,
            BookingRequestDetails::Schedule(_) => BookingType::Schedule,
        }
    }
}
