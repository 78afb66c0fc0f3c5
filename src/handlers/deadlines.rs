use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::{bearer_token, check_auth};
use crate::errors::AppError;
use crate::services::appointments;
use crate::state::AppState;

// GET /api/appointments/:id/deadline
pub async fn get_deadline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let status = appointments::deadline_status(&state, &id)?;
    Ok(Json(serde_json::to_value(status).unwrap_or_default()))
}

// DELETE /api/appointments/:id/deadline
pub async fn stop_deadline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let stopped = appointments::stop_monitoring(&state, &id)?;
    Ok(Json(serde_json::json!({ "stopped": stopped })))
}

// GET /api/deadlines/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub appointment_id: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource clients cannot set headers, so a query token is accepted too.
    let token = query
        .token
        .as_deref()
        .unwrap_or_else(|| bearer_token(&headers));
    if token != state.config.api_token {
        return Err(AppError::Unauthorized);
    }

    let filter = query.appointment_id;
    let rx = state.deadline_tx.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => {
            if filter.as_deref().is_some_and(|id| id != event.appointment_id) {
                return None;
            }
            let kind = if event.expired { "deadline_expired" } else { "deadline_tick" };
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event(kind)))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let merged = StreamExt::merge(live_stream, keepalive_stream);

    Ok(Sse::new(merged))
}
