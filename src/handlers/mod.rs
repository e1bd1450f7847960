pub mod admin;
pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod health;
pub mod loyalty;
pub mod queue;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/services", get(catalog::list_services))
        .route("/api/services/:id/options", get(catalog::get_service_options))
        .route(
            "/api/service-options/:service_id",
            get(catalog::get_service_options),
        )
        .route("/api/categories", get(catalog::list_categories))
        .route(
            "/api/bookings/available-slots",
            get(bookings::available_slots),
        )
        .route("/api/bookings/quote", post(bookings::quote))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/my", get(bookings::my_bookings))
        .route("/api/bookings/:id/cancel", put(bookings::cancel_booking))
        .route("/api/loyalty/points", get(loyalty::get_points))
        .route("/api/loyalty/status", get(loyalty::get_status))
        .route("/api/loyalty/history", get(loyalty::get_history))
        .route("/api/loyalty/use-points", post(loyalty::use_points))
        .route("/api/queue", get(queue::get_queue))
        .route("/api/queue/events", get(queue::events_stream))
        .route("/api/admin/bookings", get(admin::get_bookings))
        .route(
            "/api/admin/bookings/:id/status",
            put(admin::update_booking_status),
        )
        .route("/api/admin/dashboard", get(admin::get_dashboard))
        .route("/api/admin/services", post(admin::create_service))
        .route("/api/admin/services/:id", put(admin::update_service))
        .route(
            "/api/admin/services/:id/options",
            post(admin::create_service_option),
        )
        .route("/api/admin/users", post(admin::create_user))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
