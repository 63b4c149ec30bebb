// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{BookAppointmentRequest, FinalizeVisitRequest};
use crate::services::{
    billing::BillingService,
    booking::BookingService,
    lifecycle::AppointmentLifecycleService,
};

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = payload?;
    let request = request.validate()?;

    let booking_service = BookingService::new(&state);
    let confirmation = booking_service.reserve(request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": confirmation.appointment,
        "bill": confirmation.bill,
        "message": "Appointment booked successfully"
    }))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(appointment_id) = appointment_id?;
    let booking_service = BookingService::new(&state);

    let details = booking_service.appointment(appointment_id).await?;

    Ok(Json(json!({
        "appointment": details.appointment,
        "bill": details.bill
    })))
}

#[axum::debug_handler]
pub async fn finalize_visit(
    State(state): State<Arc<AppState>>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<FinalizeVisitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Path(appointment_id) = appointment_id?;
    let Json(request) = payload?;

    let lifecycle_service = AppointmentLifecycleService::new(&state);
    let appointment = lifecycle_service.finalize_visit(appointment_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "message": "Prescription saved and appointment marked as done",
        "appointment": appointment
    }))))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppState>>,
    appointment_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(appointment_id) = appointment_id?;
    let lifecycle_service = AppointmentLifecycleService::new(&state);

    let prescription = lifecycle_service.prescription(appointment_id).await?;

    Ok(Json(json!(prescription)))
}

// ==============================================================================
// BILLING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_unpaid_bills(
    State(state): State<Arc<AppState>>,
    patient_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(patient_id) = patient_id?;
    let billing_service = BillingService::new(&state);

    let bills = billing_service.unpaid_bills(patient_id).await?;

    Ok(Json(json!({
        "bills": bills,
        "total": bills.len()
    })))
}

#[axum::debug_handler]
pub async fn count_unpaid_bills(
    State(state): State<Arc<AppState>>,
    patient_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(patient_id) = patient_id?;
    let billing_service = BillingService::new(&state);

    let count = billing_service.unpaid_count(patient_id).await?;

    Ok(Json(json!({ "count": count })))
}
