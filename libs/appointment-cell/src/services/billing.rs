use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::{AppState, SchedulingStore, StagedWrite, UnitOfWork};
use shared_models::{Bill, BillStatus, Doctor};

use crate::models::AppointmentError;

/// Creates bills inside an open unit of work. There is no standalone path: a bill
/// for an appointment only ever exists because the booking that produced it committed.
pub struct BillingEmitter;

impl BillingEmitter {
    pub fn consultation_description(doctor: &Doctor) -> String {
        format!("Consultation fee for Dr. {}", doctor.full_name())
    }

    /// Stages one unpaid bill on `unit` and returns it.
    pub fn emit(
        unit: &mut dyn UnitOfWork,
        patient_id: Uuid,
        total_amount: f64,
        description: String,
        appointment_id: Option<Uuid>,
    ) -> Bill {
        let bill = Bill {
            id: Uuid::new_v4(),
            patient_id,
            total_amount,
            description,
            status: BillStatus::Unpaid,
            appointment_id,
            bill_date: Utc::now(),
        };

        debug!("Staging bill {} of {} for patient {}", bill.id, total_amount, patient_id);
        unit.stage(StagedWrite::InsertBill(bill.clone()));
        bill
    }
}

/// Read side of billing. Settlement belongs to the payment service.
pub struct BillingService {
    store: Arc<dyn SchedulingStore>,
}

impl BillingService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Unpaid bills of a patient, newest first. A patient with no bills, known
    /// or not, gets an empty list.
    pub async fn unpaid_bills(&self, patient_id: Uuid) -> Result<Vec<Bill>, AppointmentError> {
        Ok(self.store.unpaid_bills(patient_id).await?)
    }

    pub async fn unpaid_count(&self, patient_id: Uuid) -> Result<usize, AppointmentError> {
        Ok(self.unpaid_bills(patient_id).await?.len())
    }
}
