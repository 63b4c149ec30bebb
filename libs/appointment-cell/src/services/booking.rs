// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::services::slot_grid::SchedulingPolicy;
use shared_database::{AppState, LockScope, SchedulingStore, StagedWrite, StoreError};
use shared_models::{Appointment, SlotKey};

use crate::models::{AppointmentDetails, AppointmentError, BookingConfirmation, BookingRequest};
use crate::services::billing::BillingEmitter;

/// Reserves slots. Each reservation and its bill commit together under a lock on
/// the (doctor, timestamp) pair, so two bookings of one slot can never both succeed.
pub struct BookingService {
    store: Arc<dyn SchedulingStore>,
    policy: SchedulingPolicy,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), SchedulingPolicy::from_config(&state.config))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>, policy: SchedulingPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn reserve(&self, request: BookingRequest) -> Result<BookingConfirmation, AppointmentError> {
        self.reserve_at(request, Utc::now()).await
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, slot = %request.appointment_date))]
    pub async fn reserve_at(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingConfirmation, AppointmentError> {
        if !self.policy.is_bookable(request.appointment_date, now) {
            return Err(AppointmentError::InvalidTime(format!(
                "{} is not an open slot in the doctor's schedule",
                request.appointment_date.to_rfc3339()
            )));
        }

        if !self.store.patient_exists(request.patient_id).await? {
            return Err(AppointmentError::PatientNotFound);
        }

        let key = SlotKey::new(request.doctor_id, request.appointment_date);
        let mut unit = self.store.begin(LockScope::Slot(key)).await?;
        debug!("Holding scope {}", unit.scope());

        if let Some(existing) = unit.appointment_at(&key).await? {
            warn!("Slot {} already held by appointment {}", key, existing.id);
            return Err(AppointmentError::SlotNotAvailable);
        }
        if unit.is_blocked(&key).await? {
            warn!("Slot {} is blocked by the doctor", key);
            return Err(AppointmentError::SlotNotAvailable);
        }

        let doctor = unit
            .find_doctor(request.doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        let appointment = Appointment::scheduled(
            doctor.id,
            request.patient_id,
            request.appointment_date,
            request.reason,
        );
        unit.stage(StagedWrite::InsertAppointment(appointment.clone()));

        let bill = BillingEmitter::emit(
            unit.as_mut(),
            request.patient_id,
            doctor.consultation_fee,
            BillingEmitter::consultation_description(&doctor),
            Some(appointment.id),
        );

        match unit.commit().await {
            Ok(()) => {
                info!("Booked appointment {} for patient {} with bill {}", appointment.id, appointment.patient_id, bill.id);
                Ok(BookingConfirmation { appointment, bill })
            }
            Err(StoreError::UniqueViolation(detail)) => {
                warn!("Lost the race for slot {}: {}", key, detail);
                Err(AppointmentError::SlotNotAvailable)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// An appointment with the bill that was committed alongside it.
    pub async fn appointment(&self, appointment_id: Uuid) -> Result<AppointmentDetails, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

        let appointment = self.store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        let bill = self.store.bills_for_appointment(appointment_id).await?.into_iter().next();

        Ok(AppointmentDetails { appointment, bill })
    }
}
