use serde::{Deserialize, Serialize};

use crate::models::{
    BookingDraft, BookingRequest, BookingRequestDetails, BookingType, ImmediateDetails,
    ImmediateRequest, ScheduleDetails, ScheduleRequest, TimeRange,
};
use crate::services::task_scheduler::{self, ScheduleError};
use crate::services::time_ranges::{self, DurationError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing {field}")]
    MissingField { field: &'static str },

    #[error("invalid {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("time ranges {first} and {second} overlap")]
    OverlappingRanges { first: TimeRange, second: TimeRange },

    #[error("{0}")]
    Schedule(#[from] ScheduleError),

    #[error("booking can only be submitted from the details step (currently {step:?})")]
    NotAtDetailsStep { step: WizardStep },

    #[error("already at the final step")]
    NoNextStep,
}

impl ValidationError {
    fn missing(field: &'static str) -> Self {
        ValidationError::MissingField { field }
    }

    fn duration(err: DurationError) -> Self {
        ValidationError::InvalidField {
            field: "duration",
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStep {
    ProfileSelection,
    BookingType,
    Details,
}

impl WizardStep {
    pub fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ProfileSelection => Some(WizardStep::BookingType),
            WizardStep::BookingType => Some(WizardStep::Details),
            WizardStep::Details => None,
        }
    }

    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ProfileSelection => None,
            WizardStep::BookingType => Some(WizardStep::ProfileSelection),
            WizardStep::Details => Some(WizardStep::BookingType),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingLimits {
    pub schedule_max_duration_minutes: u32,
}

impl Default for BookingLimits {
    fn default() -> Self {
        Self {
            schedule_max_duration_minutes: 360,
        }
    }
}

/// Step-by-step booking wizard. Each step has a pure guard; `advance` moves
/// forward only when the current guard passes.
#[derive(Debug, Clone)]
pub struct BookingRequestBuilder {
    step: WizardStep,
    draft: BookingDraft,
    limits: BookingLimits,
}

impl BookingRequestBuilder {
    pub fn new(limits: BookingLimits) -> Self {
        Self {
            step: WizardStep::ProfileSelection,
            draft: BookingDraft::default(),
            limits,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn select_profiles<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected: Vec<String> = Vec::new();
        for id in ids {
            let id = id.as_ref().trim();
            if !id.is_empty() && !selected.iter().any(|s| s == id) {
                selected.push(id.to_string());
            }
        }
        self.draft.elderly_profile_ids = selected;
    }

    pub fn set_booking_type(&mut self, booking_type: BookingType) {
        self.draft.booking_type = Some(booking_type);
    }

    pub fn set_schedule_details(&mut self, details: ScheduleDetails) {
        self.draft.schedule = details;
    }

    pub fn set_immediate_details(&mut self, details: ImmediateDetails) {
        self.draft.immediate = details;
    }

    /// Bucket ranges followed by the custom ranges they do not already cover.
    pub fn resolved_ranges(&self) -> Vec<TimeRange> {
        resolve_ranges(&self.draft.immediate)
    }

    /// `"09:00–10:30"` once start time and a valid duration are set.
    pub fn schedule_display_range(&self) -> Option<String> {
        let details = &self.draft.schedule;
        let start = details.start_time?;
        let minutes = time_ranges::validate_duration(
            details.duration_minutes?,
            self.limits.schedule_max_duration_minutes,
        )
        .ok()?;
        Some(time_ranges::display_range(start, minutes))
    }

    pub fn validate_current(&self) -> Result<(), ValidationError> {
        check_step(self.step, &self.draft, &self.limits)
    }

    pub fn advance(&mut self) -> Result<WizardStep, ValidationError> {
        if let Err(err) = self.validate_current() {
            tracing::debug!(step = ?self.step, error = %err, "wizard step blocked");
            return Err(err);
        }
        let next = self.step.next().ok_or(ValidationError::NoNextStep)?;
        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Produces the final request and starts over with an empty draft.
    pub fn submit(&mut self) -> Result<BookingRequest, ValidationError> {
        if self.step != WizardStep::Details {
            return Err(ValidationError::NotAtDetailsStep { step: self.step });
        }
        check_step(WizardStep::ProfileSelection, &self.draft, &self.limits)?;
        check_step(WizardStep::BookingType, &self.draft, &self.limits)?;
        let details = build_details(&self.draft, &self.limits)?;

        let request = BookingRequest {
            elderly_profile_ids: self.draft.elderly_profile_ids.clone(),
            details,
        };
        tracing::info!(
            booking_type = request.booking_type().as_str(),
            profiles = request.elderly_profile_ids.len(),
            "booking request assembled"
        );
        *self = Self::new(self.limits);
        Ok(request)
    }
}

fn resolve_ranges(details: &ImmediateDetails) -> Vec<TimeRange> {
    let predefined = time_ranges::derive_ranges_from_buckets(&details.buckets);
    let custom = time_ranges::custom_only(&predefined, &details.custom_ranges);
    time_ranges::merge_with_custom_ranges(&predefined, &custom)
}

fn check_step(
    step: WizardStep,
    draft: &BookingDraft,
    limits: &BookingLimits,
) -> Result<(), ValidationError> {
    match step {
        WizardStep::ProfileSelection => {
            if draft.elderly_profile_ids.is_empty() {
                return Err(ValidationError::missing("elderly profile"));
            }
            Ok(())
        }
        WizardStep::BookingType => {
            if draft.booking_type.is_none() {
                return Err(ValidationError::missing("booking type"));
            }
            Ok(())
        }
        WizardStep::Details => build_details(draft, limits).map(|_| ()),
    }
}

fn build_details(
    draft: &BookingDraft,
    limits: &BookingLimits,
) -> Result<BookingRequestDetails, ValidationError> {
    match draft.booking_type {
        None => Err(ValidationError::missing("booking type")),
        Some(BookingType::Schedule) => {
            build_schedule(&draft.schedule, limits).map(BookingRequestDetails::Schedule)
        }
        Some(BookingType::Immediate) => {
            build_immediate(&draft.immediate).map(BookingRequestDetails::Immediate)
        }
    }
}

fn build_schedule(
    details: &ScheduleDetails,
    limits: &BookingLimits,
) -> Result<ScheduleRequest, ValidationError> {
    let date = details.date.ok_or(ValidationError::missing("date"))?;
    let start_time = details
        .start_time
        .ok_or(ValidationError::missing("start time"))?;
    let raw_duration = details
        .duration_minutes
        .ok_or(ValidationError::missing("duration"))?;
    let duration_minutes =
        time_ranges::validate_duration(raw_duration, limits.schedule_max_duration_minutes)
            .map_err(ValidationError::duration)?;

    let end = time_ranges::compute_end_time(start_time, duration_minutes);
    Ok(ScheduleRequest {
        date,
        start_time,
        end_time: end.time,
        duration_minutes,
        notes: details
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

fn build_immediate(details: &ImmediateDetails) -> Result<ImmediateRequest, ValidationError> {
    let work_location = details
        .work_location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or(ValidationError::missing("work location"))?
        .to_string();
    let hourly_rate = details
        .hourly_rate
        .ok_or(ValidationError::missing("hourly rate"))?;
    if hourly_rate == 0 {
        return Err(ValidationError::InvalidField {
            field: "hourly rate",
            message: "must be greater than zero".to_string(),
        });
    }
    if details.working_days.is_empty() {
        return Err(ValidationError::missing("working days"));
    }
    let time_ranges = resolve_ranges(details);
    if time_ranges.is_empty() {
        return Err(ValidationError::missing("time ranges"));
    }
    let duration = details.duration.ok_or(ValidationError::missing("duration"))?;
    if details.tasks.is_empty() {
        return Err(ValidationError::missing("tasks"));
    }
    if let Some(overlap) = time_ranges::find_overlaps(&time_ranges).into_iter().next() {
        return Err(ValidationError::OverlappingRanges {
            first: overlap.first,
            second: overlap.second,
        });
    }

    let schedule = task_scheduler::schedule(
        &details.tasks,
        &duration,
        &details.working_days,
        &time_ranges,
    )?;

    let mut working_days = details.working_days.clone();
    working_days.sort_by_key(|d| d.num_days_from_monday());
    working_days.dedup();

    Ok(ImmediateRequest {
        work_location,
        hourly_rate,
        working_days,
        time_ranges,
        duration,
        tasks: details.tasks.clone(),
        schedule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DurationSpec, TaskDraft};
    use crate::models::time_range::parse_clock;
    use chrono::{NaiveDate, Weekday};

    fn builder() -> BookingRequestBuilder {
        BookingRequestBuilder::new(BookingLimits::default())
    }

    fn immediate_details() -> ImmediateDetails {
        ImmediateDetails {
            work_location: Some("12 Nguyen Trai, District 1".to_string()),
            hourly_rate: Some(80_000),
            working_days: vec![Weekday::Mon, Weekday::Wed],
            buckets: vec!["morning".to_string()],
            custom_ranges: vec![],
            duration: Some(DurationSpec::Weekly { weeks: 4 }),
            tasks: vec![TaskDraft {
                name: "Medication reminders".to_string(),
                description: None,
                days: vec![],
            }],
        }
    }

    fn at_details(booking_type: BookingType) -> BookingRequestBuilder {
        let mut b = builder();
        b.select_profiles(["ep-1"]);
        b.advance().unwrap();
        b.set_booking_type(booking_type);
        b.advance().unwrap();
        b
    }

    #[test]
    fn test_profile_step_requires_selection() {
        let mut b = builder();
        let err = b.advance().unwrap_err();
        assert_eq!(err.to_string(), "missing elderly profile");
        assert_eq!(b.step(), WizardStep::ProfileSelection);

        b.select_profiles(["  ", ""]);
        assert!(b.advance().is_err());

        b.select_profiles(["ep-1", "ep-1", "ep-2"]);
        assert_eq!(b.draft().elderly_profile_ids, vec!["ep-1", "ep-2"]);
        assert_eq!(b.advance().unwrap(), WizardStep::BookingType);
    }

    #[test]
    fn test_type_step_requires_choice() {
        let mut b = builder();
        b.select_profiles(["ep-1"]);
        b.advance().unwrap();
        assert_eq!(b.advance().unwrap_err(), ValidationError::missing("booking type"));
        assert_eq!(b.step(), WizardStep::BookingType);
        b.set_booking_type(BookingType::Schedule);
        assert_eq!(b.advance().unwrap(), WizardStep::Details);
    }

    #[test]
    fn test_advance_from_details_reports_field_error_before_end_of_wizard() {
        let mut b = at_details(BookingType::Schedule);
        assert_eq!(b.advance().unwrap_err(), ValidationError::missing("date"));
        assert_eq!(b.step(), WizardStep::Details);

        b.set_schedule_details(ScheduleDetails {
            date: NaiveDate::from_ymd_opt(2025, 2, 1),
            start_time: Some(parse_clock("09:00").unwrap()),
            duration_minutes: Some(60),
            notes: None,
        });
        assert_eq!(b.advance().unwrap_err(), ValidationError::NoNextStep);
        assert_eq!(b.step(), WizardStep::Details);
    }

    #[test]
    fn test_schedule_booking_end_to_end() {
        let mut b = at_details(BookingType::Schedule);
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        b.set_schedule_details(ScheduleDetails {
            date: Some(date),
            ..Default::default()
        });
        assert_eq!(b.submit().unwrap_err(), ValidationError::missing("start time"));

        b.set_schedule_details(ScheduleDetails {
            date: Some(date),
            start_time: Some(parse_clock("09:00").unwrap()),
            ..Default::default()
        });
        assert_eq!(b.submit().unwrap_err(), ValidationError::missing("duration"));
        assert_eq!(b.schedule_display_range(), None);

        b.set_schedule_details(ScheduleDetails {
            date: Some(date),
            start_time: Some(parse_clock("09:00").unwrap()),
            duration_minutes: Some(90),
            notes: Some("  ".to_string()),
        });
        assert_eq!(b.schedule_display_range().as_deref(), Some("09:00–10:30"));

        let request = b.submit().unwrap();
        match request.details {
            BookingRequestDetails::Schedule(ref s) => {
                assert_eq!(s.date, date);
                assert_eq!(s.duration_minutes, 90);
                assert_eq!(s.end_time, parse_clock("10:30").unwrap());
                assert_eq!(s.notes, None);
            }
            _ => panic!("expected schedule request"),
        }
        assert_eq!(b.step(), WizardStep::ProfileSelection);
        assert!(b.draft().elderly_profile_ids.is_empty());
    }

    #[test]
    fn test_schedule_duration_bounds() {
        let mut b = at_details(BookingType::Schedule);
        b.set_schedule_details(ScheduleDetails {
            date: NaiveDate::from_ymd_opt(2025, 2, 1),
            start_time: Some(parse_clock("09:00").unwrap()),
            duration_minutes: Some(361),
            notes: None,
        });
        let err = b.submit().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidField {
                field: "duration",
                ..
            }
        ));
        assert_eq!(b.step(), WizardStep::Details);
    }

    #[test]
    fn test_immediate_missing_tasks_names_tasks() {
        let mut b = at_details(BookingType::Immediate);
        b.set_immediate_details(ImmediateDetails {
            tasks: vec![],
            ..immediate_details()
        });
        let err = b.validate_current().unwrap_err();
        assert!(err.to_string().contains("tasks"));
        assert!(b.submit().is_err());
        assert_eq!(b.step(), WizardStep::Details);
    }

    #[test]
    fn test_immediate_reports_first_missing_field() {
        let mut b = at_details(BookingType::Immediate);
        b.set_immediate_details(ImmediateDetails::default());
        assert_eq!(
            b.validate_current().unwrap_err(),
            ValidationError::missing("work location")
        );

        b.set_immediate_details(ImmediateDetails {
            buckets: vec![],
            ..immediate_details()
        });
        assert_eq!(
            b.validate_current().unwrap_err(),
            ValidationError::missing("time ranges")
        );

        b.set_immediate_details(ImmediateDetails {
            working_days: vec![],
            ..immediate_details()
        });
        assert_eq!(
            b.validate_current().unwrap_err(),
            ValidationError::missing("working days")
        );
    }

    #[test]
    fn test_immediate_rejects_overlapping_ranges() {
        let mut b = at_details(BookingType::Immediate);
        b.set_immediate_details(ImmediateDetails {
            custom_ranges: vec![TimeRange::parse("11:00", "13:00").unwrap()],
            ..immediate_details()
        });
        let err = b.validate_current().unwrap_err();
        assert!(matches!(err, ValidationError::OverlappingRanges { .. }));
    }

    #[test]
    fn test_immediate_custom_copy_of_bucket_is_dropped() {
        let mut b = at_details(BookingType::Immediate);
        b.set_immediate_details(ImmediateDetails {
            custom_ranges: vec![
                TimeRange::parse("06:00", "12:00").unwrap(),
                TimeRange::parse("14:00", "16:00").unwrap(),
            ],
            ..immediate_details()
        });
        assert_eq!(b.resolved_ranges().len(), 2);

        let request = b.submit().unwrap();
        let BookingRequestDetails::Immediate(immediate) = request.details else {
            panic!("expected immediate request");
        };
        assert_eq!(immediate.time_ranges.len(), 2);
        assert_eq!(immediate.schedule.days.len(), 2);
        assert_eq!(immediate.working_days, vec![Weekday::Mon, Weekday::Wed]);
    }

    #[test]
    fn test_immediate_orphaned_task_surfaces_scheduler_message() {
        let mut b = at_details(BookingType::Immediate);
        b.set_immediate_details(ImmediateDetails {
            tasks: vec![TaskDraft {
                name: "Sunday mass".to_string(),
                description: None,
                days: vec![Weekday::Sun],
            }],
            ..immediate_details()
        });
        let err = b.validate_current().unwrap_err();
        assert_eq!(
            err.to_string(),
            "task \"Sunday mass\" is not assigned to any selected working day"
        );
    }

    #[test]
    fn test_submit_only_from_details() {
        let mut b = builder();
        b.select_profiles(["ep-1"]);
        assert!(matches!(
            b.submit(),
            Err(ValidationError::NotAtDetailsStep { .. })
        ));
    }

    #[test]
    fn test_submit_revalidates_earlier_steps() {
        let mut b = at_details(BookingType::Immediate);
        b.set_immediate_details(immediate_details());
        b.select_profiles(Vec::<String>::new());
        assert_eq!(
            b.submit().unwrap_err(),
            ValidationError::missing("elderly profile")
        );
    }

    #[test]
    fn test_back_moves_one_step() {
        let mut b = at_details(BookingType::Schedule);
        assert_eq!(b.back(), WizardStep::BookingType);
        assert_eq!(b.back(), WizardStep::ProfileSelection);
        assert_eq!(b.back(), WizardStep::ProfileSelection);
    }
}
