pub mod appointments;
pub mod deadlines;
pub mod drafts;
pub mod health;
pub mod time_ranges;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::Router;

use crate::errors::AppError;
use crate::state::AppState;

pub(crate) fn bearer_token(headers: &HeaderMap) -> &str {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    auth.strip_prefix("Bearer ").unwrap_or("")
}

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    if bearer_token(headers) != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/time-ranges/compose", post(time_ranges::compose))
        .route("/api/time-ranges/end-time", post(time_ranges::end_time))
        .route("/api/drafts", post(drafts::create_draft))
        .route(
            "/api/drafts/:id",
            get(drafts::get_draft).delete(drafts::delete_draft),
        )
        .route("/api/drafts/:id/profiles", post(drafts::select_profiles))
        .route("/api/drafts/:id/booking-type", post(drafts::set_booking_type))
        .route("/api/drafts/:id/schedule", post(drafts::set_schedule))
        .route("/api/drafts/:id/immediate", post(drafts::set_immediate))
        .route("/api/drafts/:id/advance", post(drafts::advance))
        .route("/api/drafts/:id/back", post(drafts::back))
        .route("/api/drafts/:id/submit", post(drafts::submit))
        .route(
            "/api/appointments/:id",
            put(appointments::sync_appointment).get(appointments::get_appointment),
        )
        .route("/api/appointments/:id/events", post(appointments::report_event))
        .route("/api/appointments/:id/cancel", post(appointments::request_cancellation))
        .route(
            "/api/appointments/:id/tasks/:task_id",
            put(appointments::update_task),
        )
        .route(
            "/api/appointments/:id/review",
            post(appointments::submit_review).get(appointments::get_review),
        )
        .route(
            "/api/appointments/:id/deadline",
            get(deadlines::get_deadline).delete(deadlines::stop_deadline),
        )
        .route("/api/deadlines/events", get(deadlines::events_stream))
        .with_state(state)
}
