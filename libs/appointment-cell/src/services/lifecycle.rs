// libs/appointment-cell/src/services/lifecycle.rs
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppState, LockScope, SchedulingStore, StagedWrite, StoreError};
use shared_models::{Appointment, AppointmentEvent, AppointmentStatus, Prescription};

use crate::models::{AppointmentError, FinalizeVisitRequest};

/// Moves appointments from Scheduled to Done. The only way in is a visit record:
/// the prescription and the status change commit together.
pub struct AppointmentLifecycleService {
    store: Arc<dyn SchedulingStore>,
}

impl AppointmentLifecycleService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Status an appointment would move to on `event`, or why it cannot.
    pub fn validate_status_transition(
        &self,
        current: AppointmentStatus,
        event: AppointmentEvent,
    ) -> Result<AppointmentStatus, AppointmentError> {
        current.on_event(event).map_err(|e| {
            warn!("Invalid status transition attempted: {}", e);
            AppointmentError::from(e)
        })
    }

    #[instrument(skip(self, request))]
    pub async fn finalize_visit(
        &self,
        appointment_id: Uuid,
        request: FinalizeVisitRequest,
    ) -> Result<Appointment, AppointmentError> {
        let (instructions, medicines, checkups) = request.validate()?;

        let mut unit = self.store.begin(LockScope::Appointment(appointment_id)).await?;
        debug!("Holding scope {}", unit.scope());

        let mut appointment = unit
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.status.is_terminal() || unit.prescription_exists(appointment_id).await? {
            warn!("Appointment {} already finalized", appointment_id);
            return Err(AppointmentError::AlreadyFinalized);
        }

        let next = self.validate_status_transition(appointment.status, AppointmentEvent::VisitFinalized)?;

        let prescription = Prescription {
            id: Uuid::new_v4(),
            appointment_id,
            instructions,
            medicines,
            checkups,
            prescription_date: Utc::now(),
        };
        unit.stage(StagedWrite::InsertPrescription(prescription.clone()));
        unit.stage(StagedWrite::UpdateAppointmentStatus {
            appointment_id,
            from: appointment.status,
            to: next,
        });

        match unit.commit().await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => return Err(AppointmentError::AlreadyFinalized),
            Err(e) => return Err(e.into()),
        }

        info!("Appointment {} finalized with prescription {}", appointment_id, prescription.id);
        appointment.status = next;
        Ok(appointment)
    }

    pub async fn prescription(&self, appointment_id: Uuid) -> Result<Prescription, AppointmentError> {
        if self.store.find_appointment(appointment_id).await?.is_none() {
            return Err(AppointmentError::NotFound);
        }

        self.store
            .find_prescription(appointment_id)
            .await?
            .ok_or(AppointmentError::PrescriptionNotFound)
    }
}
