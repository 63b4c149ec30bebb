use std::sync::Arc;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use uuid::Uuid;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{AppState, MemoryStore};
use shared_models::Doctor;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub store_backend: StoreBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            store_backend: StoreBackend::Memory,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            store_backend: self.store_backend,
            ..AppConfig::default()
        }
    }
}

pub struct TestDoctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub consultation_fee: f64,
}

impl Default for TestDoctor {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: "Nadia".to_string(),
            last_name: "Fernando".to_string(),
            consultation_fee: 500.0,
        }
    }
}

impl TestDoctor {
    pub fn with_fee(consultation_fee: f64) -> Self {
        Self { consultation_fee, ..Self::default() }
    }

    pub fn to_doctor(&self) -> Doctor {
        Doctor {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            consultation_fee: self.consultation_fee,
        }
    }
}

/// A memory-backed clinic with one doctor and one patient registered.
pub struct TestClinic {
    pub store: MemoryStore,
    pub state: Arc<AppState>,
    pub doctor: Doctor,
    pub patient_id: Uuid,
}

impl TestClinic {
    pub async fn new() -> Self {
        Self::with_doctor(TestDoctor::default()).await
    }

    pub async fn with_doctor(doctor: TestDoctor) -> Self {
        let store = MemoryStore::new();
        let doctor = doctor.to_doctor();
        let patient_id = Uuid::new_v4();

        store.insert_doctor(doctor.clone()).await;
        store.insert_patient(patient_id).await;

        let state = Arc::new(AppState::new(
            TestConfig::default().to_app_config(),
            Arc::new(store.clone()),
        ));

        Self { store, state, doctor, patient_id }
    }

    pub async fn add_patient(&self) -> Uuid {
        let patient_id = Uuid::new_v4();
        self.store.insert_patient(patient_id).await;
        patient_id
    }
}

/// A fixed Monday 07:00 UTC, before the working day opens.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 4, 7, 0, 0)
        .single()
        .expect("fixed timestamp is unambiguous")
}

/// The first weekday strictly after `now`'s date, at `hour:minute` UTC.
pub fn next_weekday_at(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).expect("valid wall-clock time");
    let mut date = now.date_naive() + Duration::days(1);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += Duration::days(1);
    }
    date.and_time(time).and_utc()
}

/// A bookable slot relative to the real clock, for tests that go through HTTP.
pub fn upcoming_slot(hour: u32) -> DateTime<Utc> {
    next_weekday_at(Utc::now(), hour, 0)
}
