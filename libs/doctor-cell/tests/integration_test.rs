use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{DayName, DaySchedule, Doctor, WeeklySchedule};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::store::{DoctorStore, InMemoryDoctorStore, SupabaseDoctorStore};
use doctor_cell::state::DoctorState;
use shared_database::SupabaseClient;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn seeded_app(config: &TestConfig) -> (Router, Doctor) {
    let store = Arc::new(InMemoryDoctorStore::new());
    let doctor = Doctor::new(
        Uuid::new_v4(),
        "Dr. Chowdhury",
        "Pediatrics",
        WeeklySchedule::new()
            .with_day(DayName::Monday, DaySchedule::open(["09:00", "10:00"]))
            .with_day(DayName::Sunday, DaySchedule::closed()),
    );
    store.insert(doctor.clone());

    let state = DoctorState::new(config.to_arc(), store);
    (doctor_routes(state), doctor)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_get_doctor_schedule_public() {
    let config = TestConfig::default();
    let (app, doctor) = seeded_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/schedule", doctor.id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = body_json(response).await;
    assert_eq!(json_response["data"]["schedule"]["monday"]["slots"], json!(["09:00", "10:00"]));
    assert_eq!(json_response["data"]["schedule"]["sunday"]["isAvailable"], false);
}

#[tokio::test]
async fn test_get_unknown_doctor_returns_404() {
    let config = TestConfig::default();
    let (app, _) = seeded_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inactive_doctor_is_hidden_from_public_reads() {
    let config = TestConfig::default();
    let store = Arc::new(InMemoryDoctorStore::new());
    let mut doctor = Doctor::new(
        Uuid::new_v4(),
        "Dr. Rahman",
        "Dermatology",
        WeeklySchedule::new().with_day(DayName::Tuesday, DaySchedule::open(["14:00"])),
    );
    doctor.is_active = false;
    store.insert(doctor.clone());
    let app = doctor_routes(DoctorState::new(config.to_arc(), store));

    for uri in [format!("/{}", doctor.id), format!("/{}/schedule", doctor.id)] {
        let request = Request::builder().method("GET").uri(&uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_malformed_doctor_id_is_bad_request() {
    let config = TestConfig::default();
    let (app, _) = seeded_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri("/not-a-uuid/schedule")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_hospital_updates_schedule() {
    let config = TestConfig::default();
    let (app, doctor) = seeded_app(&config);

    let hospital = TestUser::new("staff@hospital.example", "hospital")
        .with_id(doctor.hospital_id)
        .with_tenant(&doctor.hospital_id.to_string());
    let token = JwtTestUtils::create_test_token(&hospital, &config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/schedule", doctor.id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({
            "days": { "saturday": { "slots": ["10:00", "11:00"], "isAvailable": true } }
        }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = body_json(response).await;
    assert_eq!(json_response["data"]["schedule"]["saturday"]["slots"], json!(["10:00", "11:00"]));
    assert_eq!(json_response["data"]["schedule"]["monday"]["slots"], json!(["09:00", "10:00"]));
}

#[tokio::test]
async fn test_patient_cannot_update_schedule() {
    let config = TestConfig::default();
    let (app, doctor) = seeded_app(&config);

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/schedule", doctor.id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({
            "days": { "monday": { "slots": [], "isAvailable": false } }
        }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_schedule_update_requires_token() {
    let config = TestConfig::default();
    let (app, doctor) = seeded_app(&config);

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/schedule", doctor.id))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "days": {} }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_supabase_store_reads_doctor_row() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let hospital_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id.to_string(), &hospital_id.to_string())
        ])))
        .mount(&mock_server)
        .await;

    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let client = Arc::new(SupabaseClient::new(&test_config.to_app_config()));
    let store = SupabaseDoctorStore::new(client);

    let doctor = store.get_doctor(doctor_id).await.unwrap().unwrap();
    assert_eq!(doctor.hospital_id, hospital_id);
    assert!(doctor.schedule.day(DayName::Saturday).unwrap().is_available);
    assert!(!doctor.schedule.day(DayName::Sunday).unwrap().is_available);
}

#[tokio::test]
async fn test_supabase_store_missing_doctor_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let client = Arc::new(SupabaseClient::new(&test_config.to_app_config()));
    let store = SupabaseDoctorStore::new(client);

    assert!(store.get_doctor(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_supabase_store_batch_lookup_uses_in_filter() {
    let mock_server = MockServer::start().await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let hospital_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("in.({},{})", first, second)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&first.to_string(), &hospital_id)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let store = SupabaseDoctorStore::new(Arc::new(SupabaseClient::new(&test_config.to_app_config())));

    let doctors = store.get_doctors(&[first, second]).await.unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].id, first);
    assert!(store.get_doctors(&[]).await.unwrap().is_empty());
}
