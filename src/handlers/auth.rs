use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn check_admin(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    match bearer_token(headers) {
        Some(token) if token == expected_token => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Resolves the customer behind the bearer token, if any was sent.
pub fn optional_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, AppError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let db = state.db()?;
    match queries::get_user_by_token(&db, token)? {
        Some(user) => Ok(Some(user)),
        None => Err(AppError::Unauthorized),
    }
}

pub fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    optional_user(state, headers)?.ok_or(AppError::Unauthorized)
}
