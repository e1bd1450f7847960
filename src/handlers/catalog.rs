use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Service, ServiceOption};
use crate::state::AppState;

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Service>>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::list_services(&db, true)?))
}

// GET /api/services/:id/options and /api/service-options/:service_id
pub async fn get_service_options(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
) -> Result<Json<Vec<ServiceOption>>, AppError> {
    let db = state.db()?;
    if queries::get_service(&db, &service_id)?.is_none() {
        return Err(AppError::NotFound(format!("service {service_id}")));
    }
    Ok(Json(queries::get_options_for_service(&db, &service_id)?))
}

// GET /api/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    let db = state.db()?;
    Ok(Json(queries::list_categories(&db)?))
}
