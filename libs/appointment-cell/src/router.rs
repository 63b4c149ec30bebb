// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use shared_database::AppState;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/prescription",
            post(handlers::finalize_visit).get(handlers::get_prescription),
        )
        .with_state(state)
}

pub fn billing_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/count/{patient_id}", get(handlers::count_unpaid_bills))
        .route("/{patient_id}", get(handlers::get_unpaid_bills))
        .with_state(state)
}
