use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::UnavailabilityBlock;

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Reserved,
    Blocked,
}

/// One grid slot as seen by a patient picking a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    pub time: DateTime<Utc>,
    pub status: SlotStatus,
    pub is_booked: bool,
    pub appointment_id: Option<Uuid>,
}

impl SlotAvailability {
    pub fn available(time: DateTime<Utc>) -> Self {
        Self { time, status: SlotStatus::Available, is_booked: false, appointment_id: None }
    }

    pub fn reserved(time: DateTime<Utc>, appointment_id: Uuid) -> Self {
        Self { time, status: SlotStatus::Reserved, is_booked: true, appointment_id: Some(appointment_id) }
    }

    pub fn blocked(time: DateTime<Utc>) -> Self {
        Self { time, status: SlotStatus::Blocked, is_booked: true, appointment_id: None }
    }
}

// ==============================================================================
// UNAVAILABILITY
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct BlockSlotRequest {
    pub time_slot: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Created(UnavailabilityBlock),
    AlreadyBlocked,
}

impl BlockOutcome {
    pub fn already_blocked(&self) -> bool {
        matches!(self, BlockOutcome::AlreadyBlocked)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Invalid time slot: {0}")]
    InvalidSlot(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            AvailabilityError::InvalidSlot(msg) => AppError::BadRequest(msg),
            AvailabilityError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}
