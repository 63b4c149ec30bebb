use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, billing_routes};
use doctor_cell::router::doctor_routes;
use shared_database::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/billing", billing_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use shared_utils::test_utils::{upcoming_slot, TestClinic};

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let clinic = TestClinic::new().await;
        let response = create_router(clinic.state.clone()).oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn book_then_see_the_slot_reserved() {
        let clinic = TestClinic::new().await;
        let app = create_router(clinic.state.clone());
        let slot = upcoming_slot(11);

        let (status, booked) = send(app.clone(), post_json("/appointments", json!({
            "doctor_id": clinic.doctor.id,
            "patient_id": clinic.patient_id,
            "appointment_date": slot,
            "reason": "Sore throat"
        }))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(app.clone(), get(&format!("/doctors/{}/availability", clinic.doctor.id))).await;
        assert_eq!(status, StatusCode::OK);
        let entry = body["slots"].as_array().unwrap()
            .iter()
            .find(|s| s["time"] == json!(slot))
            .cloned()
            .unwrap();
        assert_eq!(entry["status"], "reserved");
        assert_eq!(entry["appointment_id"], booked["appointment"]["id"]);

        let (status, body) = send(app, get(&format!("/billing/count/{}", clinic.patient_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn blocked_slot_rejects_booking() {
        let clinic = TestClinic::new().await;
        let app = create_router(clinic.state.clone());
        let slot = upcoming_slot(15);

        let (status, _) = send(app.clone(), post_json(
            &format!("/doctors/{}/availability/unavailable", clinic.doctor.id),
            json!({ "time_slot": slot }),
        )).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app, post_json("/appointments", json!({
            "doctor_id": clinic.doctor.id,
            "patient_id": clinic.patient_id,
            "appointment_date": slot,
            "reason": "Sore throat"
        }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "This time slot is no longer available. Please choose another.");
    }
}
