use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::time_range::{format_clock, parse_clock};
use crate::models::{
    Appointment, AppointmentStatus, Ratings, Review, TaskStatus, WorkTask,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Appointments ──

pub fn upsert_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO appointments (id, booking_code, status, locally_expired, work_date, start_time, end_time,
            caregiver_id, elderly_profile_id, service_package_id, caregiver_response_deadline, cancel_reason,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
         ON CONFLICT(id) DO UPDATE SET
           booking_code = excluded.booking_code,
           status = excluded.status,
           locally_expired = excluded.locally_expired,
           work_date = excluded.work_date,
           start_time = excluded.start_time,
           end_time = excluded.end_time,
           caregiver_id = excluded.caregiver_id,
           elderly_profile_id = excluded.elderly_profile_id,
           service_package_id = excluded.service_package_id,
           caregiver_response_deadline = excluded.caregiver_response_deadline,
           cancel_reason = excluded.cancel_reason,
           updated_at = excluded.updated_at",
        params![
            appointment.id,
            appointment.booking_code,
            appointment.status.as_str(),
            appointment.locally_expired,
            appointment.work_date.format("%Y-%m-%d").to_string(),
            format_clock(appointment.start_time),
            format_clock(appointment.end_time),
            appointment.caregiver_id,
            appointment.elderly_profile_id,
            appointment.service_package_id,
            appointment.caregiver_response_deadline.map(|d| d.to_rfc3339()),
            appointment.cancel_reason,
            appointment.created_at.format(TIMESTAMP_FORMAT).to_string(),
            appointment.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;

    tx.execute(
        "DELETE FROM work_tasks WHERE appointment_id = ?1",
        params![appointment.id],
    )?;
    for (position, task) in appointment.tasks.iter().enumerate() {
        tx.execute(
            "INSERT INTO work_tasks (appointment_id, id, position, name, description, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                appointment.id,
                task.id,
                position as i64,
                task.name,
                task.description,
                task.status.as_str(),
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

struct AppointmentRow {
    id: String,
    booking_code: String,
    status: String,
    locally_expired: bool,
    work_date: String,
    start_time: String,
    end_time: String,
    caregiver_id: String,
    elderly_profile_id: String,
    service_package_id: Option<String>,
    caregiver_response_deadline: Option<String>,
    cancel_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

const APPOINTMENT_COLUMNS: &str = "id, booking_code, status, locally_expired, work_date, start_time, end_time,
    caregiver_id, elderly_profile_id, service_package_id, caregiver_response_deadline, cancel_reason,
    created_at, updated_at";

fn read_appointment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        booking_code: row.get(1)?,
        status: row.get(2)?,
        locally_expired: row.get(3)?,
        work_date: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        caregiver_id: row.get(7)?,
        elderly_profile_id: row.get(8)?,
        service_package_id: row.get(9)?,
        caregiver_response_deadline: row.get(10)?,
        cancel_reason: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn into_appointment(row: AppointmentRow, tasks: Vec<WorkTask>) -> anyhow::Result<Appointment> {
    let status = AppointmentStatus::parse(&row.status)
        .ok_or_else(|| anyhow::anyhow!("unknown appointment status in database: {}", row.status))?;
    let work_date = NaiveDate::parse_from_str(&row.work_date, "%Y-%m-%d")?;
    let start_time: NaiveTime = parse_clock(&row.start_time)?;
    let end_time: NaiveTime = parse_clock(&row.end_time)?;
    let caregiver_response_deadline = row
        .caregiver_response_deadline
        .as_deref()
        .map(DateTime::parse_from_rfc3339)
        .transpose()?
        .map(|d| d.with_timezone(&Utc));

    Ok(Appointment {
        id: row.id,
        booking_code: row.booking_code,
        status,
        locally_expired: row.locally_expired,
        work_date,
        start_time,
        end_time,
        caregiver_id: row.caregiver_id,
        elderly_profile_id: row.elderly_profile_id,
        service_package_id: row.service_package_id,
        caregiver_response_deadline,
        cancel_reason: row.cancel_reason,
        tasks,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}

fn get_tasks(conn: &Connection, appointment_id: &str) -> anyhow::Result<Vec<WorkTask>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, status FROM work_tasks WHERE appointment_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![appointment_id], |row| {
        let status: String = row.get(3)?;
        Ok(WorkTask {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            status: TaskStatus::parse(&status),
        })
    })?;

    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id],
            read_appointment_row,
        )
        .optional()?;

    match row {
        Some(row) => {
            let tasks = get_tasks(conn, &row.id)?;
            Ok(Some(into_appointment(row, tasks)?))
        }
        None => Ok(None),
    }
}

/// Pending appointments whose countdown should be running.
pub fn get_pending_with_deadline(conn: &Connection) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE status = ?1 AND caregiver_response_deadline IS NOT NULL AND locally_expired = 0"
    ))?;
    let rows = stmt.query_map(
        params![AppointmentStatus::PendingCaregiver.as_str()],
        read_appointment_row,
    )?;

    let mut appointments = Vec::new();
    for row in rows {
        let row = row?;
        let tasks = get_tasks(conn, &row.id)?;
        appointments.push(into_appointment(row, tasks)?);
    }
    Ok(appointments)
}

pub fn set_locally_expired(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string();
    let count = conn.execute(
        "UPDATE appointments SET locally_expired = 1, updated_at = ?1 WHERE id = ?2 AND status = ?3",
        params![now, id, AppointmentStatus::PendingCaregiver.as_str()],
    )?;
    Ok(count > 0)
}

pub fn update_task_status(
    conn: &Connection,
    appointment_id: &str,
    task_id: &str,
    status: TaskStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE work_tasks SET status = ?1 WHERE appointment_id = ?2 AND id = ?3",
        params![status.as_str(), appointment_id, task_id],
    )?;
    Ok(count > 0)
}

// ── Reviews ──

pub fn get_review(conn: &Connection, appointment_id: &str) -> anyhow::Result<Option<Review>> {
    let review = conn
        .query_row(
            "SELECT appointment_id, overall, professionalism, attitude, punctuality, quality, comment, created_at
             FROM reviews WHERE appointment_id = ?1",
            params![appointment_id],
            |row| {
                let created_at: String = row.get(7)?;
                Ok(Review {
                    appointment_id: row.get(0)?,
                    ratings: Ratings {
                        overall: row.get(1)?,
                        professionalism: row.get(2)?,
                        attitude: row.get(3)?,
                        punctuality: row.get(4)?,
                        quality: row.get(5)?,
                    },
                    comment: row.get(6)?,
                    created_at: parse_timestamp(&created_at),
                })
            },
        )
        .optional()?;
    Ok(review)
}

/// Inserts the review unless one exists. Returns whether a row was written.
pub fn insert_review(conn: &Connection, review: &Review) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT INTO reviews (appointment_id, overall, professionalism, attitude, punctuality, quality, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(appointment_id) DO NOTHING",
        params![
            review.appointment_id,
            review.ratings.overall,
            review.ratings.professionalism,
            review.ratings.attitude,
            review.ratings.punctuality,
            review.ratings.quality,
            review.comment,
            review.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(count > 0)
}
