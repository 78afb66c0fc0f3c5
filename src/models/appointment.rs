use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    PendingCaregiver,
    CaregiverApproved,
    InProgress,
    CompletedWaitingReview,
    Completed,
    Cancelled,
    Expired,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::PendingCaregiver,
        AppointmentStatus::CaregiverApproved,
        AppointmentStatus::InProgress,
        AppointmentStatus::CompletedWaitingReview,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingCaregiver => "PENDING_CAREGIVER",
            AppointmentStatus::CaregiverApproved => "CAREGIVER_APPROVED",
            AppointmentStatus::InProgress => "IN_PROGRESS",
            AppointmentStatus::CompletedWaitingReview => "COMPLETED_WAITING_REVIEW",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Expired
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    Done,
    NotCompleted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::Done => "DONE",
            TaskStatus::NotCompleted => "NOT_COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "DONE" => TaskStatus::Done,
            "NOT_COMPLETED" => TaskStatus::NotCompleted,
            _ => TaskStatus::NotStarted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkTask {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub booking_code: String,
    pub status: AppointmentStatus,
    /// Set when the local countdown elapsed before the backend reported a
    /// response. Cleared by the next authoritative status.
    pub locally_expired: bool,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub caregiver_id: String,
    pub elderly_profile_id: String,
    pub service_package_id: Option<String>,
    pub caregiver_response_deadline: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub tasks: Vec<WorkTask>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Status the consumer should act on: a locally elapsed deadline reads as
    /// EXPIRED until the backend confirms otherwise.
    pub fn effective_status(&self) -> AppointmentStatus {
        if self.locally_expired && self.status == AppointmentStatus::PendingCaregiver {
            AppointmentStatus::Expired
        } else {
            self.status
        }
    }

    pub fn active_deadline(&self) -> Option<DateTime<Utc>> {
        if self.status == AppointmentStatus::PendingCaregiver {
            self.caregiver_response_deadline
        } else {
            None
        }
    }

    pub fn ends_next_day(&self) -> bool {
        self.end_time <= self.start_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePackageTemplate {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskTemplate>,
}

/// Appointment as the backend sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    #[serde(default)]
    pub booking_code: Option<String>,
    pub status: AppointmentStatus,
    pub work_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub caregiver_id: String,
    pub elderly_profile_id: String,
    #[serde(default)]
    pub service_package: Option<ServicePackageTemplate>,
    #[serde(default)]
    pub caregiver_response_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
    #[serde(default)]
    pub work_schedule: Option<WorkScheduleRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkScheduleRecord {
    #[serde(default)]
    pub work_tasks: Vec<WorkTaskRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkTaskRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// Outbound cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequest {
    pub appointment_id: String,
    pub reason: String,
}
