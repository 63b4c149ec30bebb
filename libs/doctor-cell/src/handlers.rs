use std::sync::Arc;

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{BlockOutcome, BlockSlotRequest};
use crate::services::{
    availability::AvailabilityService,
    unavailability::UnavailabilityRegistry,
};

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<AppState>>,
    doctor_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(doctor_id) = doctor_id?;
    let availability_service = AvailabilityService::new(&state);

    let slots = availability_service.availability(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn mark_unavailable(
    State(state): State<Arc<AppState>>,
    doctor_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BlockSlotRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(doctor_id) = doctor_id?;
    let Json(request) = payload?;

    let time_slot = request.time_slot
        .ok_or_else(|| AppError::BadRequest("Time slot is required".to_string()))?;

    let registry = UnavailabilityRegistry::new(&state);
    let outcome = registry.block(doctor_id, time_slot).await?;

    let message = match &outcome {
        BlockOutcome::Created(_) => "Slot marked as unavailable.",
        BlockOutcome::AlreadyBlocked => "Slot was already unavailable.",
    };

    Ok(Json(json!({
        "message": message,
        "already_blocked": outcome.already_blocked()
    })))
}

#[axum::debug_handler]
pub async fn list_unavailability(
    State(state): State<Arc<AppState>>,
    doctor_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(doctor_id) = doctor_id?;
    let registry = UnavailabilityRegistry::new(&state);

    let blocks = registry.blocks(doctor_id).await?;

    Ok(Json(json!({
        "unavailability": blocks,
        "total": blocks.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppState>>,
    doctor_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(doctor_id) = doctor_id?;
    let availability_service = AvailabilityService::new(&state);

    let appointments = availability_service.appointments(doctor_id).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
