use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::check_auth;
use crate::errors::AppError;
use crate::models::{BookingType, ImmediateDetails, ScheduleDetails};
use crate::services::booking_builder::BookingRequestBuilder;
use crate::state::AppState;

fn draft_json(id: &str, builder: &BookingRequestBuilder) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "step": builder.step(),
        "draft": builder.draft(),
        "resolved_ranges": builder.resolved_ranges(),
        "schedule_display_range": builder.schedule_display_range(),
    })
}

/// Runs `f` against the draft, holding the drafts lock for its duration.
fn with_draft<T>(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut BookingRequestBuilder) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let mut drafts = state.drafts.lock().unwrap();
    let builder = drafts
        .get_mut(id)
        .ok_or_else(|| AppError::NotFound(format!("draft {id}")))?;
    f(builder)
}

// POST /api/drafts
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let id = uuid::Uuid::new_v4().to_string();
    let builder = BookingRequestBuilder::new(state.config.booking_limits());
    let body = draft_json(&id, &builder);
    state.drafts.lock().unwrap().insert(id.clone(), builder);

    tracing::debug!(draft_id = %id, "booking draft created");
    Ok((StatusCode::CREATED, Json(body)))
}

// GET /api/drafts/:id
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    with_draft(&state, &id, |builder| Ok(Json(draft_json(&id, builder))))
}

// DELETE /api/drafts/:id
pub async fn delete_draft(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    if state.drafts.lock().unwrap().remove(&id).is_none() {
        return Err(AppError::NotFound(format!("draft {id}")));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

// POST /api/drafts/:id/profiles
#[derive(Deserialize)]
pub struct ProfilesRequest {
    pub elderly_profile_ids: Vec<String>,
}

pub async fn select_profiles(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ProfilesRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    with_draft(&state, &id, |builder| {
        builder.select_profiles(&body.elderly_profile_ids);
        Ok(Json(draft_json(&id, builder)))
    })
}

// POST /api/drafts/:id/booking-type
#[derive(Deserialize)]
pub struct BookingTypeRequest {
    pub booking_type: BookingType,
}

pub async fn set_booking_type(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<BookingTypeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    with_draft(&state, &id, |builder| {
        builder.set_booking_type(body.booking_type);
        Ok(Json(draft_json(&id, builder)))
    })
}

// POST /api/drafts/:id/schedule
pub async fn set_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ScheduleDetails>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    with_draft(&state, &id, |builder| {
        builder.set_schedule_details(body);
        Ok(Json(draft_json(&id, builder)))
    })
}

// POST /api/drafts/:id/immediate
pub async fn set_immediate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ImmediateDetails>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    with_draft(&state, &id, |builder| {
        builder.set_immediate_details(body);
        Ok(Json(draft_json(&id, builder)))
    })
}

// POST /api/drafts/:id/advance
pub async fn advance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    with_draft(&state, &id, |builder| {
        builder.advance()?;
        Ok(Json(draft_json(&id, builder)))
    })
}

// POST /api/drafts/:id/back
pub async fn back(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    with_draft(&state, &id, |builder| {
        builder.back();
        Ok(Json(draft_json(&id, builder)))
    })
}

// POST /api/drafts/:id/submit
pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let request = {
        let mut drafts = state.drafts.lock().unwrap();
        let builder = drafts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("draft {id}")))?;
        let request = builder.submit()?;
        drafts.remove(&id);
        request
    };

    tracing::info!(draft_id = %id, "booking draft submitted");
    Ok(Json(serde_json::json!({ "request": request })))
}
