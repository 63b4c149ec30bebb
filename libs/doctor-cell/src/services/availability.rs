use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::{AppState, SchedulingStore};
use shared_models::Appointment;

use crate::models::{AvailabilityError, SlotAvailability};
use crate::services::slot_grid::SchedulingPolicy;

/// Classifies each grid slot of a doctor as available, reserved or blocked.
pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
    policy: SchedulingPolicy,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), SchedulingPolicy::from_config(&state.config))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>, policy: SchedulingPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn availability(&self, doctor_id: Uuid) -> Result<Vec<SlotAvailability>, AvailabilityError> {
        self.availability_at(doctor_id, Utc::now()).await
    }

    /// Availability as of `now`. Ascending by time; a reservation wins over a block
    /// on the same slot.
    pub async fn availability_at(
        &self,
        doctor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotAvailability>, AvailabilityError> {
        if self.store.find_doctor(doctor_id).await?.is_none() {
            return Err(AvailabilityError::DoctorNotFound);
        }

        let grid = self.policy.generate(now);
        let (Some(first), Some(last)) = (grid.first().copied(), grid.last().copied()) else {
            return Ok(Vec::new());
        };
        let until = last + self.policy.slot_length();

        let reserved: HashMap<DateTime<Utc>, Uuid> = self.store
            .appointments_between(doctor_id, first, until)
            .await?
            .into_iter()
            .map(|a| (a.appointment_date, a.id))
            .collect();

        let blocked: HashSet<DateTime<Utc>> = self.store
            .blocks_between(doctor_id, first, until)
            .await?
            .into_iter()
            .map(|b| b.unavailable_time)
            .collect();

        debug!(
            "Doctor {}: {} grid slots, {} reserved, {} blocked",
            doctor_id, grid.len(), reserved.len(), blocked.len()
        );

        Ok(grid
            .into_iter()
            .map(|time| match reserved.get(&time) {
                Some(appointment_id) => SlotAvailability::reserved(time, *appointment_id),
                None if blocked.contains(&time) => SlotAvailability::blocked(time),
                None => SlotAvailability::available(time),
            })
            .collect())
    }

    /// Every appointment of a doctor, ascending by date.
    pub async fn appointments(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AvailabilityError> {
        if self.store.find_doctor(doctor_id).await?.is_none() {
            return Err(AvailabilityError::DoctorNotFound);
        }
        Ok(self.store.doctor_appointments(doctor_id).await?)
    }
}
