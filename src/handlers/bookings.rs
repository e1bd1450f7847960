use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::{current_user, optional_user};
use crate::models::availability::format_time;
use crate::models::Booking;
use crate::services::events;
use crate::services::lifecycle::{self, NewBooking};
use crate::services::quote::{compose_quote, Quote};
use crate::services::scheduling::{bucket_slots, compute_available_slots, DayPeriod};
use crate::state::AppState;

pub(crate) fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// GET /api/bookings/available-slots
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub service_id: Option<String>,
    pub duration: Option<i32>,
    pub option_ids: Option<String>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    date: NaiveDate,
    duration: i32,
    slots: Vec<String>,
    buckets: BTreeMap<DayPeriod, Vec<String>>,
}

pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let db = state.db()?;

    let duration = match (query.duration, query.service_id.as_deref()) {
        (Some(duration), _) => duration,
        (None, Some(service_id)) => {
            let service = queries::get_service(&db, service_id)?
                .filter(|s| s.active)
                .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;
            let option_ids = split_ids(query.option_ids.as_deref());
            let options = queries::get_options_by_ids(&db, &option_ids)?;
            compose_quote(&service, option_ids.iter().map(String::as_str), &options, 0, 0)?
                .total_duration
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "either serviceId or duration is required".to_string(),
            ))
        }
    };

    let existing = queries::get_bookings_for_date(&db, query.date)?;
    drop(db);

    let slots = compute_available_slots(
        query.date,
        duration,
        &existing,
        &state.config.business_hours,
        state.config.slot_granularity_minutes,
        local_now(),
    )?;

    let buckets: BTreeMap<DayPeriod, Vec<String>> = bucket_slots(&slots)
        .into_iter()
        .map(|(period, times)| (period, times.into_iter().map(format_time).collect()))
        .collect();

    Ok(Json(SlotsResponse {
        date: query.date,
        duration,
        slots: slots.into_iter().map(format_time).collect(),
        buckets,
    }))
}

// POST /api/bookings/quote
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub service_id: String,
    #[serde(default)]
    pub option_ids: Vec<String>,
    #[serde(default)]
    pub points_to_use: i64,
}

pub async fn quote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    let user = optional_user(&state, &headers)?;

    let db = state.db()?;
    let service = queries::get_service(&db, &body.service_id)?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::NotFound(format!("service {}", body.service_id)))?;
    let options = queries::get_options_by_ids(&db, &body.option_ids)?;
    let balance = match &user {
        Some(u) => queries::get_points_balance(&db, &u.id)?,
        None => 0,
    };

    let quote = compose_quote(
        &service,
        body.option_ids.iter().map(String::as_str),
        &options,
        body.points_to_use,
        balance,
    )?;
    Ok(Json(quote))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let user = current_user(&state, &headers)?;

    let booking = {
        let mut db = state.db()?;
        lifecycle::create_booking(&mut db, &user, &body, &state.config, local_now())?
    };
    events::publish(&state, "created", &booking);

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/my
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user = current_user(&state, &headers)?;
    let db = state.db()?;
    Ok(Json(queries::get_bookings_for_user(&db, &user.id)?))
}

// PUT /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let user = current_user(&state, &headers)?;

    let booking = {
        let mut db = state.db()?;
        lifecycle::cancel_by_customer(&mut db, &user, &id)?
    };
    events::publish(&state, "cancelled", &booking);

    Ok(Json(booking))
}
