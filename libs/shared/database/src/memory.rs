// libs/shared/database/src/memory.rs
//
// In-process scheduling store for single-instance deployments and tests.
// Scope locks are async mutexes keyed by `LockScope`; table state sits behind
// one RwLock and commits validate every staged write before applying any.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentStatus, Bill, BillStatus, Doctor, Prescription, SlotKey,
    UnavailabilityBlock,
};

use crate::store::{LockScope, SchedulingStore, StagedWrite, StoreError, UnitOfWork};

#[derive(Default)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashSet<Uuid>,
    appointments: HashMap<Uuid, Appointment>,
    appointment_slots: HashMap<SlotKey, Uuid>,
    blocks: HashMap<SlotKey, UnavailabilityBlock>,
    bills: Vec<Bill>,
    prescriptions: HashMap<Uuid, Prescription>,
}

impl Tables {
    fn appointment_at(&self, key: &SlotKey) -> Option<Appointment> {
        self.appointment_slots
            .get(key)
            .and_then(|id| self.appointments.get(id))
            .cloned()
    }

    /// Checks every staged write against current rows plus earlier writes of the same unit.
    fn validate(&self, writes: &[StagedWrite]) -> Result<(), StoreError> {
        let mut new_slots = HashSet::new();
        let mut new_blocks = HashSet::new();
        let mut new_prescriptions = HashSet::new();
        let mut statuses: HashMap<Uuid, AppointmentStatus> = HashMap::new();

        for write in writes {
            match write {
                StagedWrite::InsertAppointment(appointment) => {
                    let key = appointment.slot_key();
                    if self.appointment_slots.contains_key(&key) || !new_slots.insert(key) {
                        return Err(StoreError::UniqueViolation(format!("appointment slot {}", key)));
                    }
                    if self.appointments.contains_key(&appointment.id) || statuses.contains_key(&appointment.id) {
                        return Err(StoreError::UniqueViolation(format!("appointment id {}", appointment.id)));
                    }
                    if !self.doctors.contains_key(&appointment.doctor_id) {
                        return Err(StoreError::ConstraintViolation(format!("unknown doctor {}", appointment.doctor_id)));
                    }
                    if !self.patients.contains(&appointment.patient_id) {
                        return Err(StoreError::ConstraintViolation(format!("unknown patient {}", appointment.patient_id)));
                    }
                    statuses.insert(appointment.id, appointment.status);
                }
                StagedWrite::InsertBill(bill) => {
                    // Also rejects NaN
                    if !(bill.total_amount >= 0.0) {
                        return Err(StoreError::ConstraintViolation(format!(
                            "bill amount must be non-negative, got {}", bill.total_amount
                        )));
                    }
                    if let Some(appointment_id) = bill.appointment_id {
                        if !self.appointments.contains_key(&appointment_id) && !statuses.contains_key(&appointment_id) {
                            return Err(StoreError::ConstraintViolation(format!("unknown appointment {}", appointment_id)));
                        }
                    }
                }
                StagedWrite::InsertBlock(block) => {
                    let key = block.slot_key();
                    if self.blocks.contains_key(&key) || !new_blocks.insert(key) {
                        return Err(StoreError::UniqueViolation(format!("unavailability {}", key)));
                    }
                }
                StagedWrite::InsertPrescription(prescription) => {
                    let appointment_id = prescription.appointment_id;
                    if !self.appointments.contains_key(&appointment_id) && !statuses.contains_key(&appointment_id) {
                        return Err(StoreError::ConstraintViolation(format!("unknown appointment {}", appointment_id)));
                    }
                    if self.prescriptions.contains_key(&appointment_id) || !new_prescriptions.insert(appointment_id) {
                        return Err(StoreError::UniqueViolation(format!("prescription for appointment {}", appointment_id)));
                    }
                }
                StagedWrite::UpdateAppointmentStatus { appointment_id, from, to } => {
                    let current = statuses
                        .get(appointment_id)
                        .copied()
                        .or_else(|| self.appointments.get(appointment_id).map(|a| a.status))
                        .ok_or_else(|| StoreError::ConstraintViolation(format!("unknown appointment {}", appointment_id)))?;
                    if current != *from {
                        return Err(StoreError::ConstraintViolation(format!(
                            "appointment {} is {} not {}", appointment_id, current, from
                        )));
                    }
                    let has_record = self.prescriptions.contains_key(appointment_id)
                        || new_prescriptions.contains(appointment_id);
                    if *to == AppointmentStatus::Done && !has_record {
                        return Err(StoreError::ConstraintViolation(format!(
                            "appointment {} cannot be Done without a prescription", appointment_id
                        )));
                    }
                    statuses.insert(*appointment_id, *to);
                }
            }
        }

        Ok(())
    }

    fn apply(&mut self, writes: Vec<StagedWrite>) {
        for write in writes {
            match write {
                StagedWrite::InsertAppointment(appointment) => {
                    self.appointment_slots.insert(appointment.slot_key(), appointment.id);
                    self.appointments.insert(appointment.id, appointment);
                }
                StagedWrite::InsertBill(bill) => self.bills.push(bill),
                StagedWrite::InsertBlock(block) => {
                    self.blocks.insert(block.slot_key(), block);
                }
                StagedWrite::InsertPrescription(prescription) => {
                    self.prescriptions.insert(prescription.appointment_id, prescription);
                }
                StagedWrite::UpdateAppointmentStatus { appointment_id, to, .. } => {
                    if let Some(appointment) = self.appointments.get_mut(&appointment_id) {
                        appointment.status = to;
                    }
                }
            }
        }
    }
}

// ==============================================================================
// SCOPE LOCKS
// ==============================================================================

#[derive(Default)]
struct ScopeLocks {
    entries: Mutex<HashMap<LockScope, Arc<AsyncMutex<()>>>>,
}

impl ScopeLocks {
    async fn acquire(locks: &Arc<ScopeLocks>, scope: LockScope) -> ScopeGuard {
        let entry = {
            let mut entries = locks.entries.lock().unwrap_or_else(PoisonError::into_inner);
            ScopeEntry {
                locks: Arc::clone(locks),
                mutex: Arc::clone(entries.entry(scope.clone()).or_default()),
                scope,
            }
        };

        // A waiter cancelled here still drops `entry`, which clears the map slot.
        let guard = Arc::clone(&entry.mutex).lock_owned().await;

        ScopeGuard { _guard: guard, _entry: entry }
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A claim on a scope's map slot, held from lookup until release or cancellation.
struct ScopeEntry {
    locks: Arc<ScopeLocks>,
    scope: LockScope,
    mutex: Arc<AsyncMutex<()>>,
}

impl Drop for ScopeEntry {
    fn drop(&mut self) {
        let mut entries = self.locks.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here: nobody else holds or awaits this scope
        if Arc::strong_count(&self.mutex) == 2 {
            entries.remove(&self.scope);
        }
    }
}

// Field order matters: the mutex guard is released before the entry is checked.
struct ScopeGuard {
    _guard: OwnedMutexGuard<()>,
    _entry: ScopeEntry,
}

// ==============================================================================
// STORE
// ==============================================================================

#[derive(Default)]
struct Inner {
    tables: RwLock<Tables>,
    locks: Arc<ScopeLocks>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a doctor as the provider directory would.
    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.inner.tables.write().await.doctors.insert(doctor.id, doctor);
    }

    /// Registers a patient as the identity collaborator would.
    pub async fn insert_patient(&self, patient_id: Uuid) {
        self.inner.tables.write().await.patients.insert(patient_id);
    }

    pub async fn appointment_count(&self) -> usize {
        self.inner.tables.read().await.appointments.len()
    }

    pub async fn bill_count(&self) -> usize {
        self.inner.tables.read().await.bills.len()
    }

    pub async fn block_count(&self) -> usize {
        self.inner.tables.read().await.blocks.len()
    }

    /// Number of scopes currently held or awaited.
    pub fn active_scopes(&self) -> usize {
        self.inner.locks.len()
    }
}

#[async_trait]
impl SchedulingStore for MemoryStore {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        Ok(self.inner.tables.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.tables.read().await.patients.contains(&patient_id))
    }

    async fn appointments_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.inner.tables.read().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.appointment_date >= from && a.appointment_date < to)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.appointment_date);
        Ok(appointments)
    }

    async fn blocks_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UnavailabilityBlock>, StoreError> {
        let tables = self.inner.tables.read().await;
        let mut blocks: Vec<UnavailabilityBlock> = tables
            .blocks
            .values()
            .filter(|b| b.doctor_id == doctor_id && b.unavailable_time >= from && b.unavailable_time < to)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.unavailable_time);
        Ok(blocks)
    }

    async fn doctor_blocks(&self, doctor_id: Uuid) -> Result<Vec<UnavailabilityBlock>, StoreError> {
        let tables = self.inner.tables.read().await;
        let mut blocks: Vec<UnavailabilityBlock> = tables
            .blocks
            .values()
            .filter(|b| b.doctor_id == doctor_id)
            .cloned()
            .collect();
        blocks.sort_by(|a, b| b.unavailable_time.cmp(&a.unavailable_time));
        Ok(blocks)
    }

    async fn is_blocked(&self, key: &SlotKey) -> Result<bool, StoreError> {
        Ok(self.inner.tables.read().await.blocks.contains_key(key))
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.inner.tables.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.inner.tables.read().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.appointment_date);
        Ok(appointments)
    }

    async fn bills_for_appointment(&self, appointment_id: Uuid) -> Result<Vec<Bill>, StoreError> {
        let tables = self.inner.tables.read().await;
        Ok(tables
            .bills
            .iter()
            .filter(|b| b.appointment_id == Some(appointment_id))
            .cloned()
            .collect())
    }

    async fn unpaid_bills(&self, patient_id: Uuid) -> Result<Vec<Bill>, StoreError> {
        let tables = self.inner.tables.read().await;
        let mut bills: Vec<Bill> = tables
            .bills
            .iter()
            .filter(|b| b.patient_id == patient_id && b.status == BillStatus::Unpaid)
            .cloned()
            .collect();
        bills.sort_by(|a, b| b.bill_date.cmp(&a.bill_date));
        Ok(bills)
    }

    async fn find_prescription(&self, appointment_id: Uuid) -> Result<Option<Prescription>, StoreError> {
        Ok(self.inner.tables.read().await.prescriptions.get(&appointment_id).cloned())
    }

    async fn begin(&self, scope: LockScope) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = ScopeLocks::acquire(&self.inner.locks, scope.clone()).await;
        debug!("Acquired scope {}", scope);

        Ok(Box::new(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            scope,
            writes: Vec::new(),
            _guard: guard,
        }))
    }
}

struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    scope: LockScope,
    writes: Vec<StagedWrite>,
    _guard: ScopeGuard,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn scope(&self) -> &LockScope {
        &self.scope
    }

    async fn appointment_at(&self, key: &SlotKey) -> Result<Option<Appointment>, StoreError> {
        Ok(self.inner.tables.read().await.appointment_at(key))
    }

    async fn is_blocked(&self, key: &SlotKey) -> Result<bool, StoreError> {
        Ok(self.inner.tables.read().await.blocks.contains_key(key))
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        Ok(self.inner.tables.read().await.doctors.get(&doctor_id).cloned())
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.inner.tables.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn prescription_exists(&self, appointment_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.tables.read().await.prescriptions.contains_key(&appointment_id))
    }

    fn stage(&mut self, write: StagedWrite) {
        self.writes.push(write);
    }

    fn staged(&self) -> &[StagedWrite] {
        &self.writes
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { inner, scope, writes, _guard } = *self;

        let mut tables = inner.tables.write().await;
        tables.validate(&writes)?;
        let applied = writes.len();
        tables.apply(writes);

        debug!("Committed {} writes under scope {}", applied, scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn doctor(fee: f64) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            first_name: "Ayesha".into(),
            last_name: "Rahman".into(),
            consultation_fee: fee,
        }
    }

    fn slot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 11, 10, 0, 0).unwrap()
    }

    async fn seeded(fee: f64) -> (MemoryStore, Doctor, Uuid) {
        let store = MemoryStore::new();
        let doctor = doctor(fee);
        let patient_id = Uuid::new_v4();
        store.insert_doctor(doctor.clone()).await;
        store.insert_patient(patient_id).await;
        (store, doctor, patient_id)
    }

    fn bill_for(appointment: &Appointment, amount: f64) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            patient_id: appointment.patient_id,
            total_amount: amount,
            description: "Consultation".into(),
            status: BillStatus::Unpaid,
            appointment_id: Some(appointment.id),
            bill_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dropping_a_unit_discards_staged_writes() {
        let (store, doctor, patient_id) = seeded(500.0).await;
        let key = SlotKey::new(doctor.id, slot());

        {
            let mut uow = store.begin(LockScope::Slot(key)).await.unwrap();
            assert_eq!(uow.scope(), &LockScope::Slot(key));
            uow.stage(StagedWrite::InsertAppointment(Appointment::scheduled(
                doctor.id, patient_id, slot(), "checkup".into(),
            )));
        }

        assert_eq!(store.appointment_count().await, 0);
        assert_eq!(store.active_scopes(), 0);
    }

    #[tokio::test]
    async fn failed_validation_applies_nothing() {
        let (store, doctor, patient_id) = seeded(500.0).await;
        let appointment = Appointment::scheduled(doctor.id, patient_id, slot(), "checkup".into());

        let mut uow = store.begin(LockScope::Slot(appointment.slot_key())).await.unwrap();
        uow.stage(StagedWrite::InsertAppointment(appointment.clone()));
        uow.stage(StagedWrite::InsertBill(bill_for(&appointment, -1.0)));

        assert!(matches!(uow.commit().await, Err(StoreError::ConstraintViolation(_))));
        assert_eq!(store.appointment_count().await, 0);
        assert_eq!(store.bill_count().await, 0);
    }

    #[tokio::test]
    async fn second_appointment_on_a_slot_is_a_unique_violation() {
        let (store, doctor, patient_id) = seeded(500.0).await;

        for expect_ok in [true, false] {
            let appointment = Appointment::scheduled(doctor.id, patient_id, slot(), "checkup".into());
            let mut uow = store.begin(LockScope::Slot(appointment.slot_key())).await.unwrap();
            uow.stage(StagedWrite::InsertAppointment(appointment));
            let result = uow.commit().await;
            assert_eq!(result.is_ok(), expect_ok);
        }

        assert_eq!(store.appointment_count().await, 1);
    }

    #[tokio::test]
    async fn done_requires_a_prescription() {
        let (store, doctor, patient_id) = seeded(500.0).await;
        let appointment = Appointment::scheduled(doctor.id, patient_id, slot(), "checkup".into());

        let mut uow = store.begin(LockScope::Slot(appointment.slot_key())).await.unwrap();
        uow.stage(StagedWrite::InsertAppointment(appointment.clone()));
        uow.commit().await.unwrap();

        let mut uow = store.begin(LockScope::Appointment(appointment.id)).await.unwrap();
        uow.stage(StagedWrite::UpdateAppointmentStatus {
            appointment_id: appointment.id,
            from: AppointmentStatus::Scheduled,
            to: AppointmentStatus::Done,
        });
        assert!(matches!(uow.commit().await, Err(StoreError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn same_scope_is_exclusive_and_other_scopes_are_not() {
        let (store, doctor, _) = seeded(500.0).await;
        let key = SlotKey::new(doctor.id, slot());
        let other = SlotKey::new(doctor.id, slot() + chrono::Duration::minutes(30));

        let held = store.begin(LockScope::Slot(key)).await.unwrap();

        let other_scope = tokio::time::timeout(Duration::from_millis(200), store.begin(LockScope::Slot(other))).await;
        assert!(other_scope.is_ok(), "a different slot must not wait");
        drop(other_scope);

        let same_scope = tokio::time::timeout(Duration::from_millis(50), store.begin(LockScope::Slot(key))).await;
        assert!(same_scope.is_err(), "the same slot must wait for the holder");

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_millis(200), store.begin(LockScope::Slot(key))).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn cancelled_waiters_leave_no_scope_behind() {
        let (store, doctor, _) = seeded(500.0).await;
        let key = SlotKey::new(doctor.id, slot());

        for _ in 0..20 {
            let held = store.begin(LockScope::Slot(key)).await.unwrap();
            let mut waiter = tokio_test::task::spawn(store.begin(LockScope::Slot(key)));
            assert!(waiter.poll().is_pending());

            drop(held);
            drop(waiter);
        }

        assert_eq!(store.active_scopes(), 0);
        let reacquired = tokio::time::timeout(Duration::from_millis(200), store.begin(LockScope::Slot(key))).await;
        assert!(reacquired.is_ok());
    }
}
