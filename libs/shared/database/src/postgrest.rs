// libs/shared/database/src/postgrest.rs
//
// Supabase-backed scheduling store. Reads go straight to PostgREST; a unit of
// work stages its writes and commits them through one stored procedure per
// lock scope, which takes a transaction-scoped advisory lock on the scope key
// and re-validates under it (see migrations/0001_scheduling_core.sql).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    Appointment, AppointmentStatus, Bill, Doctor, Prescription, SlotKey, UnavailabilityBlock,
};

use crate::store::{LockScope, SchedulingStore, StagedWrite, StoreError, UnitOfWork};
use crate::supabase::SupabaseClient;

fn encode_time(time: &DateTime<Utc>) -> String {
    urlencoding::encode(&time.to_rfc3339()).into_owned()
}

async fn fetch_rows<T>(client: &SupabaseClient, path: &str) -> Result<Vec<T>, StoreError>
where T: DeserializeOwned {
    let rows: Vec<Value> = client.request(Method::GET, path, None).await?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::from))
        .collect()
}

async fn fetch_first<T>(client: &SupabaseClient, path: &str) -> Result<Option<T>, StoreError>
where T: DeserializeOwned {
    Ok(fetch_rows(client, path).await?.into_iter().next())
}

async fn slot_taken(client: &SupabaseClient, key: &SlotKey) -> Result<Option<Appointment>, StoreError> {
    let path = format!(
        "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&limit=1",
        key.doctor_id, encode_time(&key.starts_at)
    );
    fetch_first(client, &path).await
}

async fn slot_blocked(client: &SupabaseClient, key: &SlotKey) -> Result<bool, StoreError> {
    let path = format!(
        "/rest/v1/doctor_unavailability?doctor_id=eq.{}&unavailable_time=eq.{}&limit=1",
        key.doctor_id, encode_time(&key.starts_at)
    );
    let rows: Vec<Value> = client.request(Method::GET, &path, None).await?;
    Ok(!rows.is_empty())
}

async fn doctor_by_id(client: &SupabaseClient, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
    let path = format!(
        "/rest/v1/doctors?id=eq.{}&select=id,first_name,last_name,consultation_fee",
        doctor_id
    );
    fetch_first(client, &path).await
}

async fn appointment_by_id(client: &SupabaseClient, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
    let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
    fetch_first(client, &path).await
}

pub struct SupabaseStore {
    client: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        doctor_by_id(&self.client, doctor_id).await
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        let rows: Vec<Value> = self.client.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    async fn appointments_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=gte.{}&appointment_date=lt.{}&order=appointment_date.asc",
            doctor_id, encode_time(&from), encode_time(&to)
        );
        fetch_rows(&self.client, &path).await
    }

    async fn blocks_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<UnavailabilityBlock>, StoreError> {
        let path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&unavailable_time=gte.{}&unavailable_time=lt.{}&order=unavailable_time.asc",
            doctor_id, encode_time(&from), encode_time(&to)
        );
        fetch_rows(&self.client, &path).await
    }

    async fn doctor_blocks(&self, doctor_id: Uuid) -> Result<Vec<UnavailabilityBlock>, StoreError> {
        let path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&order=unavailable_time.desc",
            doctor_id
        );
        fetch_rows(&self.client, &path).await
    }

    async fn is_blocked(&self, key: &SlotKey) -> Result<bool, StoreError> {
        slot_blocked(&self.client, key).await
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        appointment_by_id(&self.client, appointment_id).await
    }

    async fn doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=appointment_date.asc",
            doctor_id
        );
        fetch_rows(&self.client, &path).await
    }

    async fn bills_for_appointment(&self, appointment_id: Uuid) -> Result<Vec<Bill>, StoreError> {
        let path = format!("/rest/v1/billing?appointment_id=eq.{}", appointment_id);
        fetch_rows(&self.client, &path).await
    }

    async fn unpaid_bills(&self, patient_id: Uuid) -> Result<Vec<Bill>, StoreError> {
        let path = format!(
            "/rest/v1/billing?patient_id=eq.{}&status=eq.unpaid&order=bill_date.desc",
            patient_id
        );
        fetch_rows(&self.client, &path).await
    }

    async fn find_prescription(&self, appointment_id: Uuid) -> Result<Option<Prescription>, StoreError> {
        let path = format!("/rest/v1/prescriptions?appointment_id=eq.{}", appointment_id);
        fetch_first(&self.client, &path).await
    }

    async fn begin(&self, scope: LockScope) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(SupabaseUnitOfWork {
            client: Arc::clone(&self.client),
            scope,
            writes: Vec::new(),
        }))
    }
}

/// Reads inside the unit are advisory; the stored procedure is the authority at commit.
struct SupabaseUnitOfWork {
    client: Arc<SupabaseClient>,
    scope: LockScope,
    writes: Vec<StagedWrite>,
}

impl SupabaseUnitOfWork {
    async fn commit_booking(&self, appointment: &Appointment, bill: &Bill) -> Result<(), StoreError> {
        let _: Value = self.client.rpc(
            "book_appointment_with_bill",
            json!({
                "p_appointment": appointment,
                "p_bill": bill,
            }),
        ).await?;

        info!("Committed appointment {} with bill {}", appointment.id, bill.id);
        Ok(())
    }

    async fn commit_finalization(
        &self,
        prescription: &Prescription,
        appointment_id: Uuid,
        from: &AppointmentStatus,
        to: &AppointmentStatus,
    ) -> Result<(), StoreError> {
        let _: Value = self.client.rpc(
            "finalize_appointment",
            json!({
                "p_prescription": prescription,
                "p_appointment_id": appointment_id,
                "p_expected_status": from,
                "p_new_status": to,
            }),
        ).await?;

        info!("Committed prescription {} for appointment {}", prescription.id, appointment_id);
        Ok(())
    }

    async fn commit_block(&self, block: &UnavailabilityBlock) -> Result<(), StoreError> {
        let _: Value = self.client.rpc("block_slot", json!({ "p_block": block })).await?;

        info!("Committed block on {}", block.slot_key());
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for SupabaseUnitOfWork {
    fn scope(&self) -> &LockScope {
        &self.scope
    }

    async fn appointment_at(&self, key: &SlotKey) -> Result<Option<Appointment>, StoreError> {
        slot_taken(&self.client, key).await
    }

    async fn is_blocked(&self, key: &SlotKey) -> Result<bool, StoreError> {
        slot_blocked(&self.client, key).await
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        doctor_by_id(&self.client, doctor_id).await
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        appointment_by_id(&self.client, appointment_id).await
    }

    async fn prescription_exists(&self, appointment_id: Uuid) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/prescriptions?appointment_id=eq.{}&select=id", appointment_id);
        let rows: Vec<Value> = self.client.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    fn stage(&mut self, write: StagedWrite) {
        self.writes.push(write);
    }

    fn staged(&self) -> &[StagedWrite] {
        &self.writes
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        debug!("Committing {} writes under scope {}", self.writes.len(), self.scope);

        match (&self.scope, self.writes.as_slice()) {
            (_, []) => Ok(()),
            (
                LockScope::Slot(_),
                [StagedWrite::InsertAppointment(appointment), StagedWrite::InsertBill(bill)],
            ) => self.commit_booking(appointment, bill).await,
            (LockScope::Slot(_), [StagedWrite::InsertBlock(block)]) => self.commit_block(block).await,
            (
                LockScope::Appointment(_),
                [
                    StagedWrite::InsertPrescription(prescription),
                    StagedWrite::UpdateAppointmentStatus { appointment_id, from, to },
                ],
            ) => self.commit_finalization(prescription, *appointment_id, from, to).await,
            (scope, writes) => Err(StoreError::Backend(format!(
                "no stored procedure for {} writes under scope {}", writes.len(), scope
            ))),
        }
    }
}
