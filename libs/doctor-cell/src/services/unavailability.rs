use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{AppState, LockScope, SchedulingStore, StagedWrite, StoreError};
use shared_models::{SlotKey, UnavailabilityBlock};

use crate::models::{AvailabilityError, BlockOutcome};
use crate::services::slot_grid::SchedulingPolicy;

/// Doctor-initiated blocks on single slots. Blocks are permanent.
pub struct UnavailabilityRegistry {
    store: Arc<dyn SchedulingStore>,
    policy: SchedulingPolicy,
}

impl UnavailabilityRegistry {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), SchedulingPolicy::from_config(&state.config))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>, policy: SchedulingPolicy) -> Self {
        Self { store, policy }
    }

    /// Blocks `time` for the doctor. Blocking an already blocked slot succeeds
    /// and writes nothing.
    pub async fn block(&self, doctor_id: Uuid, time: DateTime<Utc>) -> Result<BlockOutcome, AvailabilityError> {
        if !self.policy.is_grid_slot(time) {
            return Err(AvailabilityError::InvalidSlot(format!(
                "{} is not a bookable slot", time.to_rfc3339()
            )));
        }

        if self.store.find_doctor(doctor_id).await?.is_none() {
            return Err(AvailabilityError::DoctorNotFound);
        }

        let key = SlotKey::new(doctor_id, time);
        let mut unit = self.store.begin(LockScope::Slot(key)).await?;

        if unit.is_blocked(&key).await? {
            debug!("Slot {} was already unavailable", key);
            return Ok(BlockOutcome::AlreadyBlocked);
        }

        let block = UnavailabilityBlock::new(doctor_id, time);
        unit.stage(StagedWrite::InsertBlock(block.clone()));

        match unit.commit().await {
            Ok(()) => {
                info!("Doctor {} marked {} unavailable", doctor_id, time.to_rfc3339());
                Ok(BlockOutcome::Created(block))
            }
            // Another instance got there first
            Err(StoreError::UniqueViolation(_)) => Ok(BlockOutcome::AlreadyBlocked),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn is_blocked(&self, doctor_id: Uuid, time: DateTime<Utc>) -> Result<bool, AvailabilityError> {
        Ok(self.store.is_blocked(&SlotKey::new(doctor_id, time)).await?)
    }

    /// Every block of a doctor, most recent timestamp first.
    pub async fn blocks(&self, doctor_id: Uuid) -> Result<Vec<UnavailabilityBlock>, AvailabilityError> {
        if self.store.find_doctor(doctor_id).await?.is_none() {
            return Err(AvailabilityError::DoctorNotFound);
        }
        Ok(self.store.doctor_blocks(doctor_id).await?)
    }
}
