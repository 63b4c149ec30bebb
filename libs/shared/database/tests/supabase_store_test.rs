use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{LockScope, SchedulingStore, StagedWrite, StoreError, SupabaseClient, SupabaseStore};
use shared_models::{
    Appointment, AppointmentStatus, Bill, BillStatus, Checkup, PrescribedMedicine, Prescription, SlotKey,
    UnavailabilityBlock,
};

fn store_for(server: &MockServer) -> SupabaseStore {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        ..AppConfig::default()
    };
    SupabaseStore::with_client(Arc::new(SupabaseClient::new(&config)))
}

fn slot() -> SlotKey {
    SlotKey::new(Uuid::new_v4(), Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap())
}

#[tokio::test]
async fn find_doctor_reads_the_directory_row() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": doctor_id,
            "first_name": "Amal",
            "last_name": "Perera",
            "consultation_fee": 2500.0
        }])))
        .mount(&server)
        .await;

    let doctor = store_for(&server).find_doctor(doctor_id).await.unwrap().unwrap();
    assert_eq!(doctor.full_name(), "Amal Perera");
    assert_eq!(doctor.consultation_fee, 2500.0);
}

#[tokio::test]
async fn missing_doctor_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let doctor = store_for(&server).find_doctor(Uuid::new_v4()).await.unwrap();
    assert!(doctor.is_none());
}

fn prescription_for(appointment_id: Uuid) -> Prescription {
    Prescription {
        id: Uuid::new_v4(),
        appointment_id,
        instructions: Some("Take after meals".into()),
        medicines: vec![PrescribedMedicine::new(
            None,
            Some("Paracetamol".into()),
            Some("tablet".into()),
            Some("500mg".into()),
            3,
            5,
        )],
        checkups: vec![Checkup { description: "Full blood count".into() }],
        prescription_date: Utc::now(),
    }
}

fn finalize_unit_writes(prescription: &Prescription) -> [StagedWrite; 2] {
    [
        StagedWrite::InsertPrescription(prescription.clone()),
        StagedWrite::UpdateAppointmentStatus {
            appointment_id: prescription.appointment_id,
            from: AppointmentStatus::Scheduled,
            to: AppointmentStatus::Done,
        },
    ]
}

#[tokio::test]
async fn block_goes_through_the_locking_procedure() {
    let server = MockServer::start().await;
    let key = slot();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/block_slot"))
        .and(body_partial_json(json!({
            "p_block": {
                "doctor_id": key.doctor_id,
                "unavailable_time": key.starts_at
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "doctor_id": key.doctor_id,
            "unavailable_time": key.starts_at
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Slot(key)).await.unwrap();
    unit.stage(StagedWrite::InsertBlock(UnavailabilityBlock::new(key.doctor_id, key.starts_at)));

    assert!(unit.commit().await.is_ok());
}

#[tokio::test]
async fn duplicate_block_is_a_unique_violation() {
    let server = MockServer::start().await;
    let key = slot();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/block_slot"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "slot is already unavailable"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Slot(key)).await.unwrap();
    unit.stage(StagedWrite::InsertBlock(UnavailabilityBlock::new(key.doctor_id, key.starts_at)));

    assert_matches!(unit.commit().await, Err(StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn finalization_sends_prescription_and_transition_in_one_call() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let prescription = prescription_for(appointment_id);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/finalize_appointment"))
        .and(body_partial_json(json!({
            "p_appointment_id": appointment_id,
            "p_expected_status": "Scheduled",
            "p_new_status": "Done",
            "p_prescription": {
                "id": prescription.id,
                "medicines": [{ "custom_name": "Paracetamol", "type": "tablet", "quantity": 15 }],
                "checkups": [{ "description": "Full blood count" }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "appointment_id": appointment_id,
            "status": "Done"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Appointment(appointment_id)).await.unwrap();
    for write in finalize_unit_writes(&prescription) {
        unit.stage(write);
    }

    assert!(unit.commit().await.is_ok());
}

#[tokio::test]
async fn second_finalization_is_a_unique_violation() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let prescription = prescription_for(appointment_id);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/finalize_appointment"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "appointment is already Done"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Appointment(appointment_id)).await.unwrap();
    for write in finalize_unit_writes(&prescription) {
        unit.stage(write);
    }

    assert_matches!(unit.commit().await, Err(StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn booking_goes_through_one_procedure_call() {
    let server = MockServer::start().await;
    let key = slot();
    let appointment = Appointment::scheduled(key.doctor_id, Uuid::new_v4(), key.starts_at, "Checkup".into());
    let bill = Bill {
        id: Uuid::new_v4(),
        patient_id: appointment.patient_id,
        total_amount: 2500.0,
        description: "Consultation fee for Dr. Amal Perera".into(),
        status: BillStatus::Unpaid,
        appointment_id: Some(appointment.id),
        bill_date: Utc::now(),
    };

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/book_appointment_with_bill"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "appointment_id": appointment.id,
            "bill_id": bill.id
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Slot(key)).await.unwrap();
    unit.stage(StagedWrite::InsertAppointment(appointment));
    unit.stage(StagedWrite::InsertBill(bill));

    assert!(unit.commit().await.is_ok());
}

#[tokio::test]
async fn lost_booking_race_is_a_unique_violation() {
    let server = MockServer::start().await;
    let key = slot();
    let appointment = Appointment::scheduled(key.doctor_id, Uuid::new_v4(), key.starts_at, "Checkup".into());
    let bill = Bill {
        id: Uuid::new_v4(),
        patient_id: appointment.patient_id,
        total_amount: 100.0,
        description: "Consultation fee".into(),
        status: BillStatus::Unpaid,
        appointment_id: Some(appointment.id),
        bill_date: Utc::now(),
    };

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/book_appointment_with_bill"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "slot is no longer available"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Slot(key)).await.unwrap();
    unit.stage(StagedWrite::InsertAppointment(appointment));
    unit.stage(StagedWrite::InsertBill(bill));

    assert_matches!(unit.commit().await, Err(StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn negative_amount_is_a_constraint_violation() {
    let server = MockServer::start().await;
    let key = slot();
    let appointment = Appointment::scheduled(key.doctor_id, Uuid::new_v4(), key.starts_at, "Checkup".into());
    let bill = Bill {
        id: Uuid::new_v4(),
        patient_id: appointment.patient_id,
        total_amount: -1.0,
        description: "Consultation fee".into(),
        status: BillStatus::Unpaid,
        appointment_id: Some(appointment.id),
        bill_date: Utc::now(),
    };

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/book_appointment_with_bill"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "23514",
            "message": "new row for relation \"billing\" violates check constraint"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Slot(key)).await.unwrap();
    unit.stage(StagedWrite::InsertAppointment(appointment));
    unit.stage(StagedWrite::InsertBill(bill));

    assert_matches!(unit.commit().await, Err(StoreError::ConstraintViolation(_)));
}

#[tokio::test]
async fn unsupported_write_shape_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    let key = slot();
    let appointment = Appointment::scheduled(key.doctor_id, Uuid::new_v4(), key.starts_at, "Checkup".into());

    let store = store_for(&server);
    let mut unit = store.begin(LockScope::Slot(key)).await.unwrap();
    unit.stage(StagedWrite::InsertAppointment(appointment));

    assert_matches!(unit.commit().await, Err(StoreError::Backend(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn unpaid_bills_filter_and_order_on_the_server() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/billing"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .and(query_param("status", "eq.unpaid"))
        .and(query_param("order", "bill_date.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "total_amount": 1500.0,
            "description": "Consultation fee for Dr. Amal Perera",
            "status": "unpaid",
            "appointment_id": null,
            "bill_date": "2030-03-04T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let bills = store_for(&server).unpaid_bills(patient_id).await.unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].status, BillStatus::Unpaid);
}
