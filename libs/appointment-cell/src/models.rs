// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::{Appointment, Bill, Checkup, InvalidTransition, PrescribedMedicine};

pub const SLOT_TAKEN_MESSAGE: &str = "This time slot is no longer available. Please choose another.";

// ==============================================================================
// BOOKING
// ==============================================================================

/// Raw booking payload. Every field is optional here so that a missing field is a
/// validation error rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub appointment_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// A booking request with every required field present.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub reason: String,
}

impl BookAppointmentRequest {
    pub fn validate(self) -> Result<BookingRequest, AppointmentError> {
        let reason = self.reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        match (self.doctor_id, self.patient_id, self.appointment_date, reason) {
            (Some(doctor_id), Some(patient_id), Some(appointment_date), Some(reason)) => Ok(BookingRequest {
                doctor_id,
                patient_id,
                appointment_date,
                reason,
            }),
            (doctor_id, patient_id, appointment_date, reason) => {
                let missing: Vec<&str> = [
                    ("doctor_id", doctor_id.is_none()),
                    ("patient_id", patient_id.is_none()),
                    ("appointment_date", appointment_date.is_none()),
                    ("reason", reason.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(AppointmentError::ValidationError(format!(
                    "Missing required fields: {}", missing.join(", ")
                )))
            }
        }
    }
}

/// An appointment together with the bill committed alongside it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    pub bill: Bill,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentDetails {
    pub appointment: Appointment,
    pub bill: Option<Bill>,
}

// ==============================================================================
// VISIT FINALIZATION
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineRequest {
    pub medication_id: Option<Uuid>,
    pub custom_name: Option<String>,
    #[serde(rename = "type")]
    pub medicine_type: Option<String>,
    pub dosage: Option<String>,
    pub times_per_day: Option<u32>,
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckupRequest {
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinalizeVisitRequest {
    pub instructions: Option<String>,
    #[serde(default)]
    pub medicines: Vec<MedicineRequest>,
    #[serde(default)]
    pub checkups: Vec<CheckupRequest>,
}

impl MedicineRequest {
    fn validate(self, index: usize) -> Result<PrescribedMedicine, AppointmentError> {
        let has_name = self.custom_name.as_deref().is_some_and(|n| !n.trim().is_empty());
        if self.medication_id.is_none() && !has_name {
            return Err(AppointmentError::ValidationError(format!(
                "Medicine {} needs a medication_id or a custom_name", index + 1
            )));
        }

        match (self.times_per_day, self.days) {
            (Some(times_per_day), Some(days)) if times_per_day > 0 && days > 0 => Ok(PrescribedMedicine::new(
                self.medication_id,
                self.custom_name,
                self.medicine_type,
                self.dosage,
                times_per_day,
                days,
            )),
            _ => Err(AppointmentError::ValidationError(format!(
                "Medicine {} needs positive times_per_day and days", index + 1
            ))),
        }
    }
}

impl FinalizeVisitRequest {
    /// Checks the record payload and derives medicine quantities.
    pub fn validate(self) -> Result<(Option<String>, Vec<PrescribedMedicine>, Vec<Checkup>), AppointmentError> {
        let medicines = self.medicines
            .into_iter()
            .enumerate()
            .map(|(index, medicine)| medicine.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        let checkups = self.checkups
            .into_iter()
            .map(|c| c.description.trim().to_string())
            .map(|description| {
                if description.is_empty() {
                    Err(AppointmentError::ValidationError("Checkup description cannot be empty".to_string()))
                } else {
                    Ok(Checkup { description })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((self.instructions, medicines, checkups))
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment slot not available")]
    SlotNotAvailable,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment has already been finalized")]
    AlreadyFinalized,

    #[error(transparent)]
    InvalidStatusTransition(#[from] InvalidTransition),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::PrescriptionNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotNotAvailable => AppError::Conflict(SLOT_TAKEN_MESSAGE.to_string()),
            AppointmentError::AlreadyFinalized | AppointmentError::InvalidStatusTransition(_) => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::InvalidTime(msg) | AppointmentError::ValidationError(msg) => AppError::BadRequest(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
