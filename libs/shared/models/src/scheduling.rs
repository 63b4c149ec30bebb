// libs/shared/models/src/scheduling.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// DOCTORS AND SLOTS
// ==============================================================================

/// Read-only view of a doctor as registered by the provider directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub consultation_fee: f64,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A (doctor, timestamp) pair. Exclusivity of bookings and blocks is keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub starts_at: DateTime<Utc>,
}

impl SlotKey {
    pub fn new(doctor_id: Uuid, starts_at: DateTime<Utc>) -> Self {
        Self { doctor_id, starts_at }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.doctor_id, self.starts_at.to_rfc3339())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnavailabilityBlock {
    pub doctor_id: Uuid,
    pub unavailable_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UnavailabilityBlock {
    pub fn new(doctor_id: Uuid, unavailable_time: DateTime<Utc>) -> Self {
        Self {
            doctor_id,
            unavailable_time,
            created_at: Utc::now(),
        }
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.doctor_id, self.unavailable_time)
    }
}

// ==============================================================================
// APPOINTMENTS AND THEIR LIFECYCLE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Scheduled,
    Done,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "Scheduled"),
            AppointmentStatus::Done => write!(f, "Done"),
        }
    }
}

/// Events that move an appointment through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    /// The doctor submitted the visit record (prescription).
    VisitFinalized,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event:?} to an appointment in status {from}")]
pub struct InvalidTransition {
    pub from: AppointmentStatus,
    pub event: AppointmentEvent,
}

impl AppointmentStatus {
    /// Initial status of every newly booked appointment.
    pub fn initial() -> Self {
        AppointmentStatus::Scheduled
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Done)
    }

    /// The only edge is Scheduled --VisitFinalized--> Done.
    pub fn on_event(self, event: AppointmentEvent) -> Result<AppointmentStatus, InvalidTransition> {
        match (self, event) {
            (AppointmentStatus::Scheduled, AppointmentEvent::VisitFinalized) => Ok(AppointmentStatus::Done),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn scheduled(doctor_id: Uuid, patient_id: Uuid, appointment_date: DateTime<Utc>, reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            appointment_date,
            status: AppointmentStatus::initial(),
            reason,
            created_at: Utc::now(),
        }
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.doctor_id, self.appointment_date)
    }
}

// ==============================================================================
// BILLING
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bill {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub total_amount: f64,
    pub description: String,
    pub status: BillStatus,
    pub appointment_id: Option<Uuid>,
    pub bill_date: DateTime<Utc>,
}

// ==============================================================================
// VISIT RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescribedMedicine {
    pub medication_id: Option<Uuid>,
    pub custom_name: Option<String>,
    #[serde(rename = "type")]
    pub medicine_type: Option<String>,
    pub dosage: Option<String>,
    pub times_per_day: u32,
    pub days: u32,
    pub quantity: u32,
}

impl PrescribedMedicine {
    pub fn new(
        medication_id: Option<Uuid>,
        custom_name: Option<String>,
        medicine_type: Option<String>,
        dosage: Option<String>,
        times_per_day: u32,
        days: u32,
    ) -> Self {
        Self {
            medication_id,
            custom_name,
            medicine_type,
            dosage,
            times_per_day,
            days,
            quantity: times_per_day.saturating_mul(days),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkup {
    pub description: String,
}

/// The record whose creation finalizes a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub instructions: Option<String>,
    pub medicines: Vec<PrescribedMedicine>,
    pub checkups: Vec<Checkup>,
    pub prescription_date: DateTime<Utc>,
}
