use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{DurationSpec, ScheduledDay, TaskDraft, TimeRange, WorkSchedule};

/// Longest date window a single immediate hire may cover.
pub const MAX_DATE_RANGE_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("at least one task is required")]
    NoTasks,

    #[error("task #{position} has no name")]
    UnnamedTask { position: usize },

    #[error("no working day selected")]
    NoWorkingDays,

    #[error("no time range selected")]
    NoTimeRanges,

    #[error("end date {end} is before start date {start}")]
    DateRangeReversed { start: NaiveDate, end: NaiveDate },

    #[error("date range may not exceed 366 days")]
    DateRangeTooLong,

    #[error("no selected working day falls between {start} and {end}")]
    NoWorkingDayInRange { start: NaiveDate, end: NaiveDate },

    #[error("duration must be at least one week")]
    NoWeeks,

    #[error("task \"{task}\" is not assigned to any selected working day")]
    OrphanedTask { task: String },
}

/// Distributes tasks across the working days implied by `duration` and
/// `working_days`, rejecting the draft when a constraint is unmet.
pub fn schedule(
    tasks: &[TaskDraft],
    duration: &DurationSpec,
    working_days: &[Weekday],
    ranges: &[TimeRange],
) -> Result<WorkSchedule, ScheduleError> {
    if tasks.is_empty() {
        return Err(ScheduleError::NoTasks);
    }
    if let Some(position) = tasks.iter().position(|t| t.name.trim().is_empty()) {
        return Err(ScheduleError::UnnamedTask {
            position: position + 1,
        });
    }
    if working_days.is_empty() {
        return Err(ScheduleError::NoWorkingDays);
    }
    if ranges.is_empty() {
        return Err(ScheduleError::NoTimeRanges);
    }

    let slots = working_slots(duration, working_days)?;

    for task in tasks {
        let assignable = slots.iter().any(|(weekday, _)| task_runs_on(task, *weekday));
        if !assignable {
            return Err(ScheduleError::OrphanedTask {
                task: task.name.trim().to_string(),
            });
        }
    }

    let days = slots
        .into_iter()
        .map(|(weekday, date)| ScheduledDay {
            weekday,
            date,
            ranges: ranges.to_vec(),
            tasks: tasks
                .iter()
                .filter(|t| task_runs_on(t, weekday))
                .map(|t| t.name.trim().to_string())
                .collect(),
        })
        .collect();

    Ok(WorkSchedule { days })
}

fn task_runs_on(task: &TaskDraft, weekday: Weekday) -> bool {
    task.days.is_empty() || task.days.contains(&weekday)
}

/// Working days in calendar order, deduplicated.
fn ordered_weekdays(working_days: &[Weekday]) -> Vec<Weekday> {
    let mut days: Vec<Weekday> = working_days.to_vec();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    days
}

fn working_slots(
    duration: &DurationSpec,
    working_days: &[Weekday],
) -> Result<Vec<(Weekday, Option<NaiveDate>)>, ScheduleError> {
    match *duration {
        DurationSpec::DateRange {
            start_date,
            end_date,
        } => {
            if end_date < start_date {
                return Err(ScheduleError::DateRangeReversed {
                    start: start_date,
                    end: end_date,
                });
            }
            if (end_date - start_date).num_days() >= MAX_DATE_RANGE_DAYS {
                return Err(ScheduleError::DateRangeTooLong);
            }
            let slots: Vec<_> = start_date
                .iter_days()
                .take_while(|d| *d <= end_date)
                .filter(|d| working_days.contains(&d.weekday()))
                .map(|d| (d.weekday(), Some(d)))
                .collect();
            if slots.is_empty() {
                return Err(ScheduleError::NoWorkingDayInRange {
                    start: start_date,
                    end: end_date,
                });
            }
            Ok(slots)
        }
        DurationSpec::Weekly { weeks } => {
            if weeks == 0 {
                return Err(ScheduleError::NoWeeks);
            }
            Ok(ordered_weekdays(working_days)
                .into_iter()
                .map(|d| (d, None))
                .collect())
        }
    }
}
