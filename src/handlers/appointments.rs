use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::check_auth;
use crate::errors::AppError;
use crate::models::{AppointmentRecord, ReviewSubmission, TaskStatus};
use crate::services::appointments;
use crate::services::lifecycle::AppointmentEvent;
use crate::state::AppState;

// PUT /api/appointments/:id
pub async fn sync_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(record): Json<AppointmentRecord>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let (appointment, outcome) = appointments::sync_record(&state, &id, record)?;
    let status = if outcome.is_none() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(serde_json::json!({
            "created": outcome.is_none(),
            "outcome": outcome,
            "appointment": appointments::view(&state, &appointment),
        })),
    ))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let appointment = appointments::load(&state, &id)?;
    Ok(Json(serde_json::to_value(appointments::view(&state, &appointment)).unwrap_or_default()))
}

// POST /api/appointments/:id/events
pub async fn report_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(event): Json<AppointmentEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let (outcome, appointment) = appointments::apply_event(&state, &id, &event)?;
    Ok(Json(serde_json::json!({
        "outcome": outcome,
        "appointment": appointments::view(&state, &appointment),
    })))
}

// POST /api/appointments/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn request_cancellation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let request = appointments::request_cancellation(&state, &id, &body.reason)?;
    Ok(Json(serde_json::to_value(request).unwrap_or_default()))
}

// PUT /api/appointments/:id/tasks/:task_id
#[derive(Deserialize)]
pub struct TaskUpdate {
    pub status: TaskStatus,
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, task_id)): Path<(String, String)>,
    Json(body): Json<TaskUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let (changed, appointment) = appointments::update_task(&state, &id, &task_id, body.status)?;
    Ok(Json(serde_json::json!({
        "changed": changed,
        "tasks": appointment.tasks,
    })))
}

// POST /api/appointments/:id/review
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReviewSubmission>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let (created, review) = appointments::submit_review(&state, &id, body)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(serde_json::json!({ "created": created, "review": review })),
    ))
}

// GET /api/appointments/:id/review
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let review = appointments::get_review(&state, &id)?;
    Ok(Json(serde_json::to_value(review).unwrap_or_default()))
}
