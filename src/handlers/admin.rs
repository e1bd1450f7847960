use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::check_admin;
use crate::handlers::bookings::local_now;
use crate::models::{Booking, BookingStatus, Service, ServiceOption, User};
use crate::services::events;
use crate::services::lifecycle;
use crate::state::AppState;

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    if let Some(status) = query.status.as_deref() {
        if BookingStatus::parse(status).is_none() {
            return Err(AppError::BadRequest(format!("unknown status: {status}")));
        }
    }
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let db = state.db()?;
    let bookings = queries::get_all_bookings(&db, query.status.as_deref(), query.date, limit)?;
    Ok(Json(bookings))
}

// PUT /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    pub progress: Option<i32>,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<Booking>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let next = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::BadRequest(format!("unknown status: {}", body.status)))?;

    let booking = {
        let mut db = state.db()?;
        lifecycle::change_status(
            &mut db,
            &id,
            next,
            body.progress,
            state.config.loyalty_earn_percent,
        )?
    };
    events::publish(&state, "status_changed", &booking);

    Ok(Json(booking))
}

// GET /api/admin/dashboard
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    bookings_by_status: BTreeMap<String, i64>,
    completed_revenue: i64,
    points_redeemed: i64,
    today_bookings: i64,
    active_services: i64,
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let stats = {
        let db = state.db()?;
        queries::get_dashboard_stats(&db, local_now().date())?
    };

    Ok(Json(DashboardResponse {
        bookings_by_status: stats.bookings_by_status,
        completed_revenue: stats.completed_revenue,
        points_redeemed: stats.points_redeemed,
        today_bookings: stats.today_bookings,
        active_services: stats.active_services,
    }))
}

// POST /api/admin/services
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    pub duration: i32,
    #[serde(default)]
    pub category: String,
    pub active: Option<bool>,
}

impl ServiceRequest {
    fn into_service(self, id: String) -> Service {
        Service {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            price: self.price,
            duration: self.duration,
            category: self.category.trim().to_lowercase(),
            active: self.active.unwrap_or(true),
        }
    }
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let service = body.into_service(uuid::Uuid::new_v4().to_string());
    service.validate()?;

    let db = state.db()?;
    queries::create_service(&db, &service)?;
    tracing::info!(service_id = %service.id, name = %service.name, "service created");

    Ok((StatusCode::CREATED, Json(service)))
}

// PUT /api/admin/services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ServiceRequest>,
) -> Result<Json<Service>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let service = body.into_service(id);
    service.validate()?;

    let db = state.db()?;
    if !queries::update_service(&db, &service)? {
        return Err(AppError::NotFound(format!("service {}", service.id)));
    }
    tracing::info!(service_id = %service.id, active = service.active, "service updated");

    Ok(Json(service))
}

// POST /api/admin/services/:id/options
#[derive(Deserialize)]
pub struct OptionRequest {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub duration: i32,
}

pub async fn create_service_option(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service_id): Path<String>,
    Json(body): Json<OptionRequest>,
) -> Result<(StatusCode, Json<ServiceOption>), AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let option = ServiceOption {
        id: uuid::Uuid::new_v4().to_string(),
        service_id,
        name: body.name.trim().to_string(),
        price: body.price,
        duration: body.duration,
    };
    option.validate()?;

    let db = state.db()?;
    if queries::get_service(&db, &option.service_id)?.is_none() {
        return Err(AppError::NotFound(format!("service {}", option.service_id)));
    }
    queries::create_service_option(&db, &option)?;

    Ok((StatusCode::CREATED, Json(option)))
}

// POST /api/admin/users
#[derive(Deserialize)]
pub struct UserRequest {
    pub name: String,
    pub phone: Option<String>,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    if body.name.trim().is_empty() {
        return Err(crate::errors::ValidationError::field("name", "must not be empty").into());
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        phone: body.phone,
        api_token: uuid::Uuid::new_v4().simple().to_string(),
        created_at: Utc::now().naive_utc(),
    };

    let db = state.db()?;
    queries::create_user(&db, &user)?;
    tracing::info!(user_id = %user.id, "customer account created");

    Ok((StatusCode::CREATED, Json(user)))
}
