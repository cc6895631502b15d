pub mod admin_links;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod public;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        // Public gateway
        .route("/bookings/public", post(public::create_booking))
        .route("/bookings/public/:public_id", get(public::get_booking))
        .route(
            "/bookings/public/cancel/:public_id",
            put(public::cancel_booking),
        )
        .route("/bookings/phone/:phone", get(public::bookings_by_phone))
        // Admin email links
        .route(
            "/bookings/admin/confirm/:public_id",
            get(admin_links::confirm),
        )
        .route("/bookings/admin/cancel/:public_id", get(admin_links::cancel))
        // Authenticated gateway
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/mine", get(bookings::my_bookings))
        .route(
            "/bookings/:id",
            get(bookings::get_booking).put(bookings::update_booking),
        )
        .route("/bookings/:id/cancel", put(bookings::cancel_booking))
        .route("/bookings/:id/status", put(bookings::update_status))
        .route("/bookings/:id/feedback", post(bookings::submit_feedback))
        .route("/bookings/:id/track", get(bookings::track_booking))
        .with_state(state)
}
