use serde::{Deserialize, Serialize};

use crate::models::AppointmentStatus::*;
use crate::models::{Appointment, AppointmentStatus, TaskStatus};

/// Shortest cancellation reason accepted, after trimming.
pub const MIN_CANCEL_REASON_CHARS: usize = 10;

/// Reason stored when the system cancels an appointment nobody responded to.
pub const SYSTEM_TIMEOUT_REASON: &str = "Cancelled automatically: caregiver response timed out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initiator {
    CareSeeker,
    Caregiver,
    System,
}

/// Edge labels of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Approve,
    Start,
    Finish,
    ConfirmCompletion,
    Cancel,
    Expire,
}

impl Transition {
    pub fn action(&self) -> &'static str {
        match self {
            Transition::Approve => "approve",
            Transition::Start => "start",
            Transition::Finish => "finish",
            Transition::ConfirmCompletion => "confirm completion of",
            Transition::Cancel => "cancel",
            Transition::Expire => "expire",
        }
    }
}

const TRANSITIONS: &[(AppointmentStatus, Transition, AppointmentStatus)] = &[
    (PendingCaregiver, Transition::Approve, CaregiverApproved),
    (PendingCaregiver, Transition::Cancel, Cancelled),
    (PendingCaregiver, Transition::Expire, Expired),
    (CaregiverApproved, Transition::Start, InProgress),
    (CaregiverApproved, Transition::Cancel, Cancelled),
    (InProgress, Transition::Finish, CompletedWaitingReview),
    (CompletedWaitingReview, Transition::ConfirmCompletion, Completed),
];

pub fn next_status(from: AppointmentStatus, transition: Transition) -> Option<AppointmentStatus> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == transition)
        .map(|(_, _, to)| *to)
}

/// The edge that leads from `from` directly to `to`, if any.
pub fn transition_between(from: AppointmentStatus, to: AppointmentStatus) -> Option<Transition> {
    TRANSITIONS
        .iter()
        .find(|(f, _, t)| *f == from && *t == to)
        .map(|(_, transition, _)| *transition)
}

/// A transition reported by an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AppointmentEvent {
    CaregiverApproved,
    WorkStarted,
    WorkFinished,
    CompletionConfirmed,
    Cancelled { reason: String, initiator: Initiator },
    Expired,
}

impl AppointmentEvent {
    pub fn transition(&self) -> Transition {
        match self {
            AppointmentEvent::CaregiverApproved => Transition::Approve,
            AppointmentEvent::WorkStarted => Transition::Start,
            AppointmentEvent::WorkFinished => Transition::Finish,
            AppointmentEvent::CompletionConfirmed => Transition::ConfirmCompletion,
            AppointmentEvent::Cancelled { .. } => Transition::Cancel,
            AppointmentEvent::Expired => Transition::Expire,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    Unchanged {
        status: AppointmentStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {} an appointment that is {from}", .transition.action())]
    Illegal {
        from: AppointmentStatus,
        transition: Transition,
    },

    #[error("status {to} cannot follow {from}")]
    IllegalReport {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("a cancellation reason of at least {min} characters is required")]
    ReasonTooShort { min: usize },

    #[error("tasks can only be updated while the appointment is IN_PROGRESS (currently {status})")]
    TasksFrozen { status: AppointmentStatus },

    #[error("a task cannot be reset to NOT_STARTED once marked")]
    TaskReset,

    #[error("task not found: {0}")]
    UnknownTask(String),

    #[error("reviews can only be submitted once the appointment is COMPLETED (currently {status})")]
    ReviewNotAllowed { status: AppointmentStatus },

    #[error("{field} rating must be between 1 and 5")]
    RatingOutOfRange { field: &'static str },
}

/// Actions a consumer may offer for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Cancel,
    UpdateTasks,
    Review,
}

pub fn can_cancel(status: AppointmentStatus) -> bool {
    next_status(status, Transition::Cancel).is_some()
}

pub fn can_edit_tasks(status: AppointmentStatus) -> bool {
    status == InProgress
}

pub fn can_review(status: AppointmentStatus) -> bool {
    status == Completed
}

pub fn allowed_actions(status: AppointmentStatus) -> Vec<Action> {
    let mut actions = Vec::new();
    if can_cancel(status) {
        actions.push(Action::Cancel);
    }
    if can_edit_tasks(status) {
        actions.push(Action::UpdateTasks);
    }
    if can_review(status) {
        actions.push(Action::Review);
    }
    actions
}

pub fn validate_cancel_reason(reason: &str) -> Result<String, TransitionError> {
    let trimmed = reason.trim();
    if trimmed.chars().count() < MIN_CANCEL_REASON_CHARS {
        return Err(TransitionError::ReasonTooShort {
            min: MIN_CANCEL_REASON_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

fn is_duplicate_terminal(current: AppointmentStatus, transition: Transition) -> bool {
    matches!(current, Cancelled | Expired)
        && matches!(transition, Transition::Cancel | Transition::Expire)
}

/// Applies an actor-reported event against the authoritative status.
///
/// A cancel or expire report on an appointment that already ended that way
/// is a no-op. Anything else the table does not list is rejected and leaves
/// the appointment untouched.
pub fn apply(
    appointment: &mut Appointment,
    event: &AppointmentEvent,
) -> Result<TransitionOutcome, TransitionError> {
    let from = appointment.status;
    let transition = event.transition();

    if is_duplicate_terminal(from, transition) {
        tracing::debug!(
            appointment_id = %appointment.id,
            status = %from,
            ?transition,
            "ignoring duplicate terminal report"
        );
        return Ok(TransitionOutcome::Unchanged { status: from });
    }

    let Some(to) = next_status(from, transition) else {
        tracing::warn!(
            appointment_id = %appointment.id,
            status = %from,
            ?transition,
            "illegal transition rejected"
        );
        return Err(TransitionError::Illegal { from, transition });
    };

    if let AppointmentEvent::Cancelled { reason, initiator } = event {
        let reason = match initiator {
            Initiator::System => SYSTEM_TIMEOUT_REASON.to_string(),
            _ => validate_cancel_reason(reason)?,
        };
        tracing::info!(appointment_id = %appointment.id, ?initiator, "appointment cancelled");
        appointment.cancel_reason = Some(reason);
    }

    appointment.status = to;
    appointment.locally_expired = false;
    tracing::info!(
        appointment_id = %appointment.id,
        from = %from,
        to = %to,
        "appointment status changed"
    );
    Ok(TransitionOutcome::Applied { from, to })
}

/// Applies a status fact from the backend. Reports are validated for
/// legality but carry no reason requirement.
pub fn report_status(
    appointment: &mut Appointment,
    reported: AppointmentStatus,
    cancel_reason: Option<&str>,
) -> Result<TransitionOutcome, TransitionError> {
    let from = appointment.status;
    if reported == from {
        return Ok(TransitionOutcome::Unchanged { status: from });
    }
    if from.is_terminal() && reported.is_terminal() {
        return Ok(TransitionOutcome::Unchanged { status: from });
    }
    if transition_between(from, reported).is_none() {
        tracing::warn!(
            appointment_id = %appointment.id,
            from = %from,
            to = %reported,
            "illegal status report rejected"
        );
        return Err(TransitionError::IllegalReport { from, to: reported });
    }

    if reported == Cancelled {
        appointment.cancel_reason = cancel_reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
    }
    appointment.status = reported;
    appointment.locally_expired = false;
    tracing::info!(
        appointment_id = %appointment.id,
        from = %from,
        to = %reported,
        "appointment status reported"
    );
    Ok(TransitionOutcome::Applied { from, to: reported })
}

/// Flags a pending appointment as expired by the local countdown. Returns
/// false when the signal is stale because the status already moved on.
pub fn mark_locally_expired(appointment: &mut Appointment) -> bool {
    if appointment.status != PendingCaregiver {
        return false;
    }
    appointment.locally_expired = true;
    true
}

/// NOT_STARTED may move to DONE or NOT_COMPLETED, and those two may swap.
/// Nothing moves back to NOT_STARTED.
pub fn set_task_status(
    appointment: &mut Appointment,
    task_id: &str,
    status: TaskStatus,
) -> Result<bool, TransitionError> {
    if !can_edit_tasks(appointment.status) {
        return Err(TransitionError::TasksFrozen {
            status: appointment.status,
        });
    }
    let task = appointment
        .tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| TransitionError::UnknownTask(task_id.to_string()))?;

    if task.status == status {
        return Ok(false);
    }
    if status == TaskStatus::NotStarted {
        return Err(TransitionError::TaskReset);
    }
    task.status = status;
    Ok(true)
}

pub fn ensure_reviewable(status: AppointmentStatus) -> Result<(), TransitionError> {
    if can_review(status) {
        Ok(())
    } else {
        Err(TransitionError::ReviewNotAllowed { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkTask;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn appointment(status: AppointmentStatus) -> Appointment {
        let now = Utc::now().naive_utc();
        Appointment {
            id: "apt-1".to_string(),
            booking_code: "BK-1".to_string(),
            status,
            locally_expired: false,
            work_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            caregiver_id: "cg-1".to_string(),
            elderly_profile_id: "ep-1".to_string(),
            service_package_id: None,
            caregiver_response_deadline: None,
            cancel_reason: None,
            tasks: vec![WorkTask {
                id: "task-1".to_string(),
                name: "Medication".to_string(),
                description: None,
                status: TaskStatus::NotStarted,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    fn cancel(reason: &str) -> AppointmentEvent {
        AppointmentEvent::Cancelled {
            reason: reason.to_string(),
            initiator: Initiator::CareSeeker,
        }
    }

    #[test]
    fn test_happy_path() {
        let mut apt = appointment(PendingCaregiver);
        for event in [
            AppointmentEvent::CaregiverApproved,
            AppointmentEvent::WorkStarted,
            AppointmentEvent::WorkFinished,
            AppointmentEvent::CompletionConfirmed,
        ] {
            assert!(matches!(
                apply(&mut apt, &event).unwrap(),
                TransitionOutcome::Applied { .. }
            ));
        }
        assert_eq!(apt.status, Completed);
    }

    #[test]
    fn test_cancel_offered_only_before_work_starts() {
        for status in AppointmentStatus::ALL {
            let expected = matches!(status, PendingCaregiver | CaregiverApproved);
            assert_eq!(can_cancel(status), expected, "{status}");
            assert_eq!(allowed_actions(status).contains(&Action::Cancel), expected);
        }
    }

    #[test]
    fn test_cancel_requires_reason() {
        let mut apt = appointment(CaregiverApproved);
        let err = apply(&mut apt, &cancel("   no   ")).unwrap_err();
        assert_eq!(
            err,
            TransitionError::ReasonTooShort {
                min: MIN_CANCEL_REASON_CHARS
            }
        );
        assert_eq!(apt.status, CaregiverApproved);

        apply(&mut apt, &cancel("  Family is visiting that week  ")).unwrap();
        assert_eq!(apt.status, Cancelled);
        assert_eq!(apt.cancel_reason.as_deref(), Some("Family is visiting that week"));
    }

    #[test]
    fn test_system_timeout_cancel_uses_fixed_reason() {
        let mut apt = appointment(PendingCaregiver);
        let event = AppointmentEvent::Cancelled {
            reason: String::new(),
            initiator: Initiator::System,
        };
        let outcome = apply(&mut apt, &event).unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                from: PendingCaregiver,
                to: Cancelled
            }
        );
        assert_eq!(apt.cancel_reason.as_deref(), Some(SYSTEM_TIMEOUT_REASON));

        // Legality still applies to system cancellations.
        let mut done = appointment(Completed);
        assert!(apply(&mut done, &event).is_err());
    }

    #[test]
    fn test_cancel_completed_is_illegal() {
        let mut apt = appointment(Completed);
        let err = apply(&mut apt, &cancel("Changed my mind about it")).unwrap_err();
        assert!(matches!(err, TransitionError::Illegal { from: Completed, .. }));
        assert_eq!(err.to_string(), "cannot cancel an appointment that is COMPLETED");
        assert_eq!(apt.status, Completed);
    }

    #[test]
    fn test_duplicate_cancel_is_noop() {
        let mut apt = appointment(PendingCaregiver);
        apply(&mut apt, &cancel("Hospital admission today")).unwrap();
        let second = apply(&mut apt, &cancel("Hospital admission today")).unwrap();
        assert_eq!(second, TransitionOutcome::Unchanged { status: Cancelled });

        let after_expiry = apply(&mut appointment(Expired), &cancel("too late anyway, sorry"));
        assert_eq!(
            after_expiry.unwrap(),
            TransitionOutcome::Unchanged { status: Expired }
        );
    }

    #[test]
    fn test_expire_only_from_pending() {
        let mut apt = appointment(CaregiverApproved);
        assert!(apply(&mut apt, &AppointmentEvent::Expired).is_err());

        let mut apt = appointment(PendingCaregiver);
        apply(&mut apt, &AppointmentEvent::Expired).unwrap();
        assert_eq!(apt.status, Expired);
    }

    #[test]
    fn test_skipping_states_is_illegal() {
        let mut apt = appointment(PendingCaregiver);
        let err = apply(&mut apt, &AppointmentEvent::WorkStarted).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: PendingCaregiver,
                transition: Transition::Start
            }
        );
    }

    #[test]
    fn test_authoritative_report_wins_over_local_expiry() {
        let mut apt = appointment(PendingCaregiver);
        assert!(mark_locally_expired(&mut apt));
        assert_eq!(apt.effective_status(), Expired);

        report_status(&mut apt, CaregiverApproved, None).unwrap();
        assert_eq!(apt.effective_status(), CaregiverApproved);
        assert!(!apt.locally_expired);
    }

    #[test]
    fn test_stale_expiry_signal_is_ignored() {
        let mut apt = appointment(CaregiverApproved);
        assert!(!mark_locally_expired(&mut apt));
        assert_eq!(apt.effective_status(), CaregiverApproved);
    }

    #[test]
    fn test_report_validates_legality() {
        let mut apt = appointment(PendingCaregiver);
        let err = report_status(&mut apt, Completed, None).unwrap_err();
        assert_eq!(
            err,
            TransitionError::IllegalReport {
                from: PendingCaregiver,
                to: Completed
            }
        );

        let mut done = appointment(Completed);
        assert!(report_status(&mut done, InProgress, None).is_err());
        assert_eq!(
            report_status(&mut done, Cancelled, None).unwrap(),
            TransitionOutcome::Unchanged { status: Completed }
        );
    }

    #[test]
    fn test_tasks_only_editable_in_progress() {
        let mut apt = appointment(CaregiverApproved);
        assert!(matches!(
            set_task_status(&mut apt, "task-1", TaskStatus::Done),
            Err(TransitionError::TasksFrozen { .. })
        ));

        apt.status = InProgress;
        assert!(set_task_status(&mut apt, "task-1", TaskStatus::Done).unwrap());
        assert!(!set_task_status(&mut apt, "task-1", TaskStatus::Done).unwrap());
        assert!(set_task_status(&mut apt, "task-1", TaskStatus::NotCompleted).unwrap());
        assert_eq!(
            set_task_status(&mut apt, "task-1", TaskStatus::NotStarted),
            Err(TransitionError::TaskReset)
        );
        assert!(matches!(
            set_task_status(&mut apt, "nope", TaskStatus::Done),
            Err(TransitionError::UnknownTask(_))
        ));

        apply(&mut apt, &AppointmentEvent::WorkFinished).unwrap();
        assert!(set_task_status(&mut apt, "task-1", TaskStatus::Done).is_err());
        assert_eq!(apt.tasks[0].status, TaskStatus::NotCompleted);
    }

    #[test]
    fn test_review_gate() {
        assert!(ensure_reviewable(Completed).is_ok());
        assert!(ensure_reviewable(CompletedWaitingReview).is_err());
        assert_eq!(allowed_actions(Completed), vec![Action::Review]);
        assert_eq!(allowed_actions(InProgress), vec![Action::UpdateTasks]);
        assert!(allowed_actions(Expired).is_empty());
    }

    #[test]
    fn test_event_wire_format() {
        let event: AppointmentEvent = serde_json::from_str(
            r#"{"event":"cancelled","reason":"Moving to another city","initiator":"care_seeker"}"#,
        )
        .unwrap();
        assert_eq!(event.transition(), Transition::Cancel);
        let approve: AppointmentEvent =
            serde_json::from_str(r#"{"event":"caregiver_approved"}"#).unwrap();
        assert_eq!(approve, AppointmentEvent::CaregiverApproved);
    }
}
