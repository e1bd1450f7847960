use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::current_user;
use crate::models::{LedgerEntry, LoyaltyStatus};
use crate::services::events;
use crate::services::lifecycle::{self, Redemption};
use crate::services::loyalty::resolve_status;
use crate::state::AppState;

// GET /api/loyalty/points
#[derive(Serialize)]
pub struct PointsResponse {
    points: i64,
}

pub async fn get_points(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PointsResponse>, AppError> {
    let user = current_user(&state, &headers)?;
    let db = state.db()?;
    Ok(Json(PointsResponse {
        points: queries::get_points_balance(&db, &user.id)?,
    }))
}

// GET /api/loyalty/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<LoyaltyStatus>, AppError> {
    let user = current_user(&state, &headers)?;
    let lifetime = {
        let db = state.db()?;
        queries::get_lifetime_points(&db, &user.id)?
    };
    Ok(Json(resolve_status(lifetime)))
}

// GET /api/loyalty/history
#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let user = current_user(&state, &headers)?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let db = state.db()?;
    Ok(Json(queries::get_ledger(&db, &user.id, limit)?))
}

// POST /api/loyalty/use-points
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsePointsRequest {
    pub booking_id: String,
    pub points: i64,
}

pub async fn use_points(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UsePointsRequest>,
) -> Result<Json<Redemption>, AppError> {
    let user = current_user(&state, &headers)?;

    let redemption = {
        let mut db = state.db()?;
        lifecycle::redeem_points(&mut db, &user, &body.booking_id, body.points)?
    };
    if redemption.points_applied > 0 {
        events::publish(&state, "points_applied", &redemption.booking);
    }

    Ok(Json(redemption))
}
