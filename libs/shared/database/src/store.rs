// libs/shared/database/src/store.rs
//
// Persistence seam for the scheduling core. Every mutation goes through a
// `UnitOfWork` opened on a `LockScope`; reads outside a unit are plain
// point-in-time reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentStatus, Bill, Doctor, Prescription, SlotKey, UnavailabilityBlock,
};

use crate::supabase::SupabaseError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("malformed record: {0}")]
    Decode(String),
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        if err.is_conflict() {
            StoreError::UniqueViolation(err.to_string())
        } else if err.is_check_violation() {
            StoreError::ConstraintViolation(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// What a unit of work holds exclusively while it is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockScope {
    /// One (doctor, timestamp) slot. Bookings and blocks on other slots never contend.
    Slot(SlotKey),
    /// One appointment, for lifecycle transitions.
    Appointment(Uuid),
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockScope::Slot(key) => write!(f, "slot:{}", key),
            LockScope::Appointment(id) => write!(f, "appointment:{}", id),
        }
    }
}

/// A write buffered inside a unit of work until commit.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    InsertAppointment(Appointment),
    InsertBill(Bill),
    InsertBlock(UnavailabilityBlock),
    InsertPrescription(Prescription),
    UpdateAppointmentStatus {
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
}

/// Scoped, all-or-nothing unit of work.
///
/// The scope lock is held from `begin` until the unit is committed or dropped.
/// Dropping without `commit` discards every staged write.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn scope(&self) -> &LockScope;

    async fn appointment_at(&self, key: &SlotKey) -> Result<Option<Appointment>, StoreError>;

    async fn is_blocked(&self, key: &SlotKey) -> Result<bool, StoreError>;

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError>;

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn prescription_exists(&self, appointment_id: Uuid) -> Result<bool, StoreError>;

    fn stage(&mut self, write: StagedWrite);

    fn staged(&self) -> &[StagedWrite];

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError>;

    /// Requester lookup owned by the identity collaborator.
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, StoreError>;

    /// Appointments with `from <= appointment_date < to`, ascending.
    async fn appointments_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Blocks with `from <= unavailable_time < to`, ascending.
    async fn blocks_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UnavailabilityBlock>, StoreError>;

    /// Every block of a doctor, latest timestamp first.
    async fn doctor_blocks(&self, doctor_id: Uuid) -> Result<Vec<UnavailabilityBlock>, StoreError>;

    async fn is_blocked(&self, key: &SlotKey) -> Result<bool, StoreError>;

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Every appointment of a doctor, ascending by date.
    async fn doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn bills_for_appointment(&self, appointment_id: Uuid) -> Result<Vec<Bill>, StoreError>;

    /// Unpaid bills of a patient, newest first.
    async fn unpaid_bills(&self, patient_id: Uuid) -> Result<Vec<Bill>, StoreError>;

    async fn find_prescription(&self, appointment_id: Uuid) -> Result<Option<Prescription>, StoreError>;

    async fn begin(&self, scope: LockScope) -> Result<Box<dyn UnitOfWork>, StoreError>;
}
