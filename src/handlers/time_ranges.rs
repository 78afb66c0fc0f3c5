use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::check_auth;
use crate::errors::AppError;
use crate::models::time_range::{format_clock, parse_clock};
use crate::models::TimeRange;
use crate::services::booking_builder::ValidationError;
use crate::services::time_ranges;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RangeInput {
    pub start: String,
    pub end: String,
}

// POST /api/time-ranges/compose
#[derive(Deserialize)]
pub struct ComposeRequest {
    #[serde(default)]
    pub buckets: Vec<String>,
    #[serde(default)]
    pub custom_ranges: Vec<RangeInput>,
}

pub async fn compose(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ComposeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let custom = body
        .custom_ranges
        .iter()
        .map(|r| TimeRange::parse(&r.start, &r.end))
        .collect::<Result<Vec<_>, _>>()?;

    let predefined = time_ranges::derive_ranges_from_buckets(&body.buckets);
    let ranges = time_ranges::merge_with_custom_ranges(&predefined, &custom);
    let overlaps = time_ranges::find_overlaps(&ranges);
    let labels: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();

    Ok(Json(serde_json::json!({
        "ranges": ranges,
        "labels": labels,
        "overlaps": overlaps,
    })))
}

// POST /api/time-ranges/end-time
#[derive(Deserialize)]
pub struct EndTimeRequest {
    pub start_time: String,
    pub duration_minutes: i64,
}

pub async fn end_time(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<EndTimeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let start = parse_clock(&body.start_time)?;
    let minutes = time_ranges::validate_duration(
        body.duration_minutes,
        state.config.schedule_max_duration_minutes,
    )
    .map_err(|e| ValidationError::InvalidField {
        field: "duration",
        message: e.to_string(),
    })?;
    let end = time_ranges::compute_end_time(start, minutes);

    Ok(Json(serde_json::json!({
        "start_time": format_clock(start),
        "end_time": end.display(),
        "crosses_midnight": end.crosses_midnight,
        "display": time_ranges::display_range(start, minutes),
    })))
}
