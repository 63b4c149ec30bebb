use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use shared_database::AppState;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability))
        .route("/{doctor_id}/availability/unavailable", post(handlers::mark_unavailable))
        .route("/{doctor_id}/unavailability", get(handlers::list_unavailability))
        .route("/{doctor_id}/appointments", get(handlers::get_doctor_appointments))
        .with_state(state)
}
