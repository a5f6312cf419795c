use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use appointment_cell::services::store::{
    AppointmentStore, InMemoryAppointmentStore, InMemoryPrescriptionStore, PrescriptionStore,
    SupabaseAppointmentStore, SupabasePrescriptionStore,
};
use appointment_cell::{appointment_routes, prescription_routes, slot_routes, AppointmentState};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::store::{DoctorStore, InMemoryDoctorStore, SupabaseDoctorStore};
use doctor_cell::DoctorState;
use shared_config::{AppConfig, StoreBackend};
use shared_database::SupabaseClient;

/// Backing stores shared by every cell.
pub struct Stores {
    pub doctors: Arc<dyn DoctorStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub prescriptions: Arc<dyn PrescriptionStore>,
}

impl Stores {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.store_backend {
            StoreBackend::Supabase => {
                info!("Using Supabase stores at {}", config.supabase_url);
                let client = Arc::new(SupabaseClient::new(config));
                Self {
                    doctors: Arc::new(SupabaseDoctorStore::new(client.clone())),
                    appointments: Arc::new(SupabaseAppointmentStore::new(client.clone())),
                    prescriptions: Arc::new(SupabasePrescriptionStore::new(client)),
                }
            }
            StoreBackend::Memory => {
                warn!("Using in-memory stores; data is lost on restart and not shared between instances");
                Self::in_memory(Arc::new(InMemoryDoctorStore::new()))
            }
        }
    }

    pub fn in_memory(doctors: Arc<InMemoryDoctorStore>) -> Self {
        Self {
            doctors,
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            prescriptions: Arc::new(InMemoryPrescriptionStore::new()),
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "mediconnect-api"
    }))
}

pub fn create_router(config: Arc<AppConfig>, stores: Stores) -> Router {
    let doctor_state = DoctorState::new(config.clone(), stores.doctors.clone());
    let appointment_state = AppointmentState::new(
        config,
        stores.doctors,
        stores.appointments,
        stores.prescriptions,
    );

    Router::new()
        .route("/", get(health))
        .nest(
            "/doctors",
            doctor_routes(doctor_state).merge(slot_routes(appointment_state.clone())),
        )
        .nest("/appointments", appointment_routes(appointment_state.clone()))
        .nest("/prescriptions", prescription_routes(appointment_state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use doctor_cell::models::{DayName, DaySchedule, Doctor, WeeklySchedule};
    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn app() -> (Router, Doctor, TestConfig) {
        let config = TestConfig::default();
        let doctors = Arc::new(InMemoryDoctorStore::new());
        let doctor = Doctor::new(
            Uuid::new_v4(),
            "Dr. Nahar",
            "ENT",
            WeeklySchedule::new().with_day(DayName::Monday, DaySchedule::open(["09:00"])),
        );
        doctors.insert(doctor.clone());

        let router = create_router(config.to_arc(), Stores::in_memory(doctors));
        (router, doctor, config)
    }

    #[tokio::test]
    async fn test_health_route() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_doctor_tree_serves_profile_schedule_and_slots() {
        let (app, doctor, _) = app();

        for uri in [
            format!("/doctors/{}", doctor.id),
            format!("/doctors/{}/schedule", doctor.id),
            format!("/doctors/{}/slots?date=2030-01-07", doctor.id),
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_appointment_routes_require_auth() {
        let (app, _, config) = app();

        let anonymous = app
            .clone()
            .oneshot(Request::builder().uri("/appointments").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let patient = TestUser::patient("patient@example.com");
        let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));
        let listed = app
            .oneshot(
                Request::builder()
                    .uri("/appointments")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
    }
}
