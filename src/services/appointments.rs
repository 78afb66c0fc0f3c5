use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::time_range::{format_clock, parse_clock};
use crate::models::{
    Appointment, AppointmentRecord, AppointmentStatus, CancellationRequest, Review,
    ReviewSubmission, ServicePackageTemplate, TaskStatus, WorkTask, WorkTaskRecord,
};
use crate::services::deadline::{self, DeadlineEvent, DeadlineSnapshot};
use crate::services::lifecycle::{
    self, Action, AppointmentEvent, Transition, TransitionError, TransitionOutcome,
};
use crate::state::AppState;

/// Appointment as presented to consumers.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    pub id: String,
    pub booking_code: String,
    pub status: AppointmentStatus,
    pub effective_status: AppointmentStatus,
    pub work_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub time_range: String,
    pub ends_next_day: bool,
    pub caregiver_id: String,
    pub elderly_profile_id: String,
    pub service_package_id: Option<String>,
    pub cancel_reason: Option<String>,
    pub tasks: Vec<WorkTask>,
    pub allowed_actions: Vec<Action>,
    pub deadline: Option<DeadlineSnapshot>,
    pub monitoring: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadlineStatus {
    pub appointment_id: String,
    pub effective_status: AppointmentStatus,
    pub deadline: Option<DeadlineSnapshot>,
    pub monitoring: bool,
}

pub fn view(state: &Arc<AppState>, appointment: &Appointment) -> AppointmentView {
    let effective_status = appointment.effective_status();
    AppointmentView {
        id: appointment.id.clone(),
        booking_code: appointment.booking_code.clone(),
        status: appointment.status,
        effective_status,
        work_date: appointment.work_date,
        start_time: format_clock(appointment.start_time),
        end_time: format_clock(appointment.end_time),
        time_range: format!(
            "{}–{}",
            format_clock(appointment.start_time),
            format_clock(appointment.end_time)
        ),
        ends_next_day: appointment.ends_next_day(),
        caregiver_id: appointment.caregiver_id.clone(),
        elderly_profile_id: appointment.elderly_profile_id.clone(),
        service_package_id: appointment.service_package_id.clone(),
        cancel_reason: appointment.cancel_reason.clone(),
        tasks: appointment.tasks.clone(),
        allowed_actions: lifecycle::allowed_actions(effective_status),
        deadline: snapshot(state, appointment),
        monitoring: is_monitoring(state, &appointment.id),
    }
}

fn snapshot(state: &Arc<AppState>, appointment: &Appointment) -> Option<DeadlineSnapshot> {
    appointment
        .active_deadline()
        .map(|deadline| DeadlineSnapshot::at(deadline, state.clock.now()))
}

fn is_monitoring(state: &Arc<AppState>, appointment_id: &str) -> bool {
    state
        .monitors
        .lock()
        .unwrap()
        .get(appointment_id)
        .is_some_and(|handle| !handle.is_finished())
}

pub fn load(state: &Arc<AppState>, id: &str) -> Result<Appointment, AppError> {
    let db = state.db.lock().unwrap();
    queries::get_appointment(&db, id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))
}

// ── Backend sync ──

/// Mirrors a backend record locally. Returns the stored appointment and the
/// status outcome, or `None` when the appointment was new.
pub fn sync_record(
    state: &Arc<AppState>,
    id: &str,
    record: AppointmentRecord,
) -> Result<(Appointment, Option<TransitionOutcome>), AppError> {
    let start_time = parse_clock(&record.start_time)?;
    let end_time = parse_clock(&record.end_time)?;
    let now = Utc::now().naive_utc();

    let (appointment, outcome) = {
        let db = state.db.lock().unwrap();
        let existing = queries::get_appointment(&db, id)?;

        let (mut appointment, outcome) = match existing {
            Some(mut appointment) => {
                let outcome = lifecycle::report_status(
                    &mut appointment,
                    record.status,
                    record.cancel_reason.as_deref(),
                )?;
                (appointment, Some(outcome))
            }
            None => {
                let appointment = Appointment {
                    id: id.to_string(),
                    booking_code: String::new(),
                    status: record.status,
                    locally_expired: false,
                    work_date: record.work_date,
                    start_time,
                    end_time,
                    caregiver_id: String::new(),
                    elderly_profile_id: String::new(),
                    service_package_id: None,
                    caregiver_response_deadline: None,
                    cancel_reason: None,
                    tasks: Vec::new(),
                    created_at: now,
                    updated_at: now,
                };
                (appointment, None)
            }
        };

        if let Some(code) = record.booking_code.filter(|c| !c.trim().is_empty()) {
            appointment.booking_code = code.trim().to_string();
        } else if appointment.booking_code.is_empty() {
            appointment.booking_code = generate_booking_code();
        }
        appointment.work_date = record.work_date;
        appointment.start_time = start_time;
        appointment.end_time = end_time;
        appointment.caregiver_id = record.caregiver_id;
        appointment.elderly_profile_id = record.elderly_profile_id;
        appointment.caregiver_response_deadline = record.caregiver_response_deadline;
        if appointment.locally_expired
            && appointment
                .active_deadline()
                .is_some_and(|d| deadline::remaining_minutes(d, state.clock.now()) > 0)
        {
            appointment.locally_expired = false;
        }
        if appointment.status == AppointmentStatus::Cancelled && appointment.cancel_reason.is_none()
        {
            appointment.cancel_reason = record
                .cancel_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty());
        }

        let record_tasks = record
            .work_schedule
            .map(|schedule| schedule.work_tasks)
            .unwrap_or_default();
        if !record_tasks.is_empty() {
            appointment.tasks = tasks_from_record(&appointment.tasks, &record_tasks);
        } else if appointment.tasks.is_empty() {
            if let Some(package) = &record.service_package {
                appointment.tasks = tasks_from_template(package);
            }
        }
        if let Some(package) = record.service_package {
            appointment.service_package_id = Some(package.id);
        }
        appointment.updated_at = now;

        queries::upsert_appointment(&db, &appointment)?;
        (appointment, outcome)
    };

    tracing::info!(
        appointment_id = %appointment.id,
        status = %appointment.status,
        created = outcome.is_none(),
        "appointment synced"
    );
    sync_monitor(state, &appointment);
    Ok((appointment, outcome))
}

fn generate_booking_code() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("BK-{}", id[..8].to_uppercase())
}

/// Record tasks win; ids and statuses carry over from matching local tasks.
fn tasks_from_record(existing: &[WorkTask], records: &[WorkTaskRecord]) -> Vec<WorkTask> {
    records
        .iter()
        .map(|record| {
            let previous = record
                .id
                .as_deref()
                .and_then(|id| existing.iter().find(|t| t.id == id))
                .or_else(|| existing.iter().find(|t| t.name == record.name.trim()));
            WorkTask {
                id: record
                    .id
                    .clone()
                    .or_else(|| previous.map(|t| t.id.clone()))
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: record.name.trim().to_string(),
                description: record.description.clone(),
                status: record
                    .status
                    .or_else(|| previous.map(|t| t.status))
                    .unwrap_or_default(),
            }
        })
        .collect()
}

fn tasks_from_template(package: &ServicePackageTemplate) -> Vec<WorkTask> {
    package
        .tasks
        .iter()
        .map(|template| WorkTask {
            id: uuid::Uuid::new_v4().to_string(),
            name: template.name.clone(),
            description: template.description.clone(),
            status: TaskStatus::NotStarted,
        })
        .collect()
}

// ── Actor operations ──

pub fn apply_event(
    state: &Arc<AppState>,
    id: &str,
    event: &AppointmentEvent,
) -> Result<(TransitionOutcome, Appointment), AppError> {
    let (outcome, appointment) = {
        let db = state.db.lock().unwrap();
        let mut appointment = queries::get_appointment(&db, id)?
            .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;
        let outcome = lifecycle::apply(&mut appointment, event)?;
        if matches!(outcome, TransitionOutcome::Applied { .. }) {
            appointment.updated_at = Utc::now().naive_utc();
            queries::upsert_appointment(&db, &appointment)?;
        }
        (outcome, appointment)
    };

    sync_monitor(state, &appointment);
    Ok((outcome, appointment))
}

/// Builds the outbound cancellation request. The local status only changes
/// once the backend reports the cancellation.
pub fn request_cancellation(
    state: &Arc<AppState>,
    id: &str,
    reason: &str,
) -> Result<CancellationRequest, AppError> {
    let appointment = load(state, id)?;
    let status = appointment.effective_status();
    if !lifecycle::can_cancel(status) {
        return Err(TransitionError::Illegal {
            from: status,
            transition: Transition::Cancel,
        }
        .into());
    }
    let reason = lifecycle::validate_cancel_reason(reason)?;

    tracing::info!(appointment_id = %appointment.id, "cancellation requested");
    Ok(CancellationRequest {
        appointment_id: appointment.id,
        reason,
    })
}

pub fn update_task(
    state: &Arc<AppState>,
    id: &str,
    task_id: &str,
    status: TaskStatus,
) -> Result<(bool, Appointment), AppError> {
    let db = state.db.lock().unwrap();
    let mut appointment = queries::get_appointment(&db, id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    let changed = lifecycle::set_task_status(&mut appointment, task_id, status)?;
    if changed {
        queries::update_task_status(&db, id, task_id, status)?;
        tracing::info!(appointment_id = %id, task_id, status = status.as_str(), "task updated");
    }
    Ok((changed, appointment))
}

/// Stores a review once. A repeated submission returns the stored review
/// and `false`.
pub fn submit_review(
    state: &Arc<AppState>,
    id: &str,
    submission: ReviewSubmission,
) -> Result<(bool, Review), AppError> {
    let db = state.db.lock().unwrap();
    let appointment = queries::get_appointment(&db, id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    if let Some(existing) = queries::get_review(&db, id)? {
        return Ok((false, existing));
    }

    lifecycle::ensure_reviewable(appointment.effective_status())?;
    if let Some(field) = submission.ratings.out_of_range() {
        return Err(TransitionError::RatingOutOfRange { field }.into());
    }

    let review = Review {
        appointment_id: appointment.id,
        ratings: submission.ratings,
        comment: submission
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        created_at: Utc::now().naive_utc(),
    };
    let created = queries::insert_review(&db, &review)?;
    tracing::info!(appointment_id = %id, overall = review.ratings.overall, "review submitted");
    Ok((created, review))
}

pub fn get_review(state: &Arc<AppState>, id: &str) -> Result<Review, AppError> {
    let db = state.db.lock().unwrap();
    queries::get_review(&db, id)?
        .ok_or_else(|| AppError::NotFound(format!("review for appointment {id}")))
}

// ── Deadline monitoring ──

pub fn deadline_status(state: &Arc<AppState>, id: &str) -> Result<DeadlineStatus, AppError> {
    let appointment = load(state, id)?;
    Ok(DeadlineStatus {
        deadline: snapshot(state, &appointment),
        monitoring: is_monitoring(state, &appointment.id),
        effective_status: appointment.effective_status(),
        appointment_id: appointment.id,
    })
}

/// Releases the countdown for an appointment. Returns whether one was running.
pub fn stop_monitoring(state: &Arc<AppState>, id: &str) -> Result<bool, AppError> {
    load(state, id)?;
    let handle = state.monitors.lock().unwrap().remove(id);
    Ok(match handle {
        Some(handle) => {
            handle.stop();
            true
        }
        None => false,
    })
}

/// Keeps exactly one countdown per pending appointment with a deadline and
/// none for anything else.
fn sync_monitor(state: &Arc<AppState>, appointment: &Appointment) {
    let mut monitors = state.monitors.lock().unwrap();
    let deadline = appointment
        .active_deadline()
        .filter(|_| !appointment.locally_expired);

    match deadline {
        Some(deadline) => {
            if monitors
                .get(&appointment.id)
                .is_some_and(|handle| handle.deadline() == deadline)
            {
                return;
            }
            let handle = deadline::spawn_monitor(
                appointment.id.clone(),
                deadline,
                Arc::clone(&state.clock),
                state.config.deadline_poll_period(),
                state.deadline_tx.clone(),
            );
            monitors.insert(appointment.id.clone(), handle);
        }
        None => {
            monitors.remove(&appointment.id);
        }
    }
}

/// Restarts countdowns for pending appointments after a restart.
pub fn rearm_monitors(state: &Arc<AppState>) -> Result<usize, AppError> {
    let pending = {
        let db = state.db.lock().unwrap();
        queries::get_pending_with_deadline(&db)?
    };
    for appointment in &pending {
        sync_monitor(state, appointment);
    }
    Ok(pending.len())
}

/// Acts on one deadline event. Returns true when the appointment was newly
/// flagged as locally expired.
pub async fn handle_deadline_event(
    state: &Arc<AppState>,
    event: &DeadlineEvent,
) -> Result<bool, AppError> {
    if !event.expired {
        return Ok(false);
    }

    let appointment = {
        let db = state.db.lock().unwrap();
        let Some(mut appointment) = queries::get_appointment(&db, &event.appointment_id)? else {
            return Ok(false);
        };
        let superseded = appointment
            .active_deadline()
            .is_some_and(|deadline| deadline::remaining_minutes(deadline, event.at) > 0);
        if superseded || appointment.locally_expired || !lifecycle::mark_locally_expired(&mut appointment)
        {
            tracing::debug!(
                appointment_id = %appointment.id,
                status = %appointment.status,
                "discarding stale expiry signal"
            );
            return Ok(false);
        }
        queries::set_locally_expired(&db, &appointment.id)?;
        appointment
    };

    // A countdown re-armed for a newer deadline stays in place.
    {
        let mut monitors = state.monitors.lock().unwrap();
        if monitors
            .get(&appointment.id)
            .is_some_and(|handle| Some(handle.deadline()) == appointment.caregiver_response_deadline)
        {
            monitors.remove(&appointment.id);
        }
    }
    tracing::info!(appointment_id = %appointment.id, "appointment expired locally");

    if let Err(e) = state.notifier.deadline_expired(&appointment).await {
        tracing::error!(
            error = %e,
            appointment_id = %appointment.id,
            "failed to deliver expiry notification"
        );
    }
    Ok(true)
}

pub fn spawn_expiry_listener(state: Arc<AppState>) -> JoinHandle<()> {
    let mut rx = state.deadline_tx.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = handle_deadline_event(&state, &event).await {
                        tracing::error!(error = %e, "failed to handle deadline event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "expiry listener lagged behind deadline events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskTemplate;

    fn task(id: &str, name: &str, status: TaskStatus) -> WorkTask {
        WorkTask {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            status,
        }
    }

    #[test]
    fn test_record_tasks_keep_local_ids_and_status() {
        let existing = vec![task("t1", "Medication", TaskStatus::Done)];
        let records = vec![
            WorkTaskRecord {
                id: None,
                name: " Medication ".to_string(),
                description: None,
                status: None,
            },
            WorkTaskRecord {
                id: Some("t2".to_string()),
                name: "Walk".to_string(),
                description: Some("Around the block".to_string()),
                status: None,
            },
        ];

        let tasks = tasks_from_record(&existing, &records);
        assert_eq!(tasks[0].id, "t1");
        assert_eq!(tasks[0].status, TaskStatus::Done);
        assert_eq!(tasks[1].id, "t2");
        assert_eq!(tasks[1].status, TaskStatus::NotStarted);
    }

    #[test]
    fn test_template_seeds_unstarted_tasks() {
        let package = ServicePackageTemplate {
            id: "pkg".to_string(),
            name: None,
            tasks: vec![
                TaskTemplate {
                    name: "Bathing".to_string(),
                    description: None,
                },
                TaskTemplate {
                    name: "Lunch".to_string(),
                    description: Some("Soft food".to_string()),
                },
            ],
        };
        let tasks = tasks_from_template(&package);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::NotStarted));
        assert_ne!(tasks[0].id, tasks[1].id);
    }

    #[test]
    fn test_booking_code_shape() {
        let code = generate_booking_code();
        assert!(code.starts_with("BK-"));
        assert_eq!(code.len(), 11);
    }
}
