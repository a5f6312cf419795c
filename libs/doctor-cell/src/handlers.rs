use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{principal_of, ApiJson, ApiPath};

use crate::models::{DoctorProfile, UpdateScheduleRequest};
use crate::services::doctor::DoctorService;
use crate::state::DoctorState;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_public(
    State(state): State<DoctorState>,
    ApiPath(doctor_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(state.doctors.clone());

    let doctor = doctor_service.get_active_doctor(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": DoctorProfile::from(&doctor)
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<DoctorState>,
    ApiPath(doctor_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(state.doctors.clone());
    let doctor = doctor_service.get_active_doctor(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "doctorId": doctor.id,
            "schedule": doctor.schedule
        }
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_doctor_schedule(
    State(state): State<DoctorState>,
    ApiPath(doctor_id): ApiPath<Uuid>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let doctor_service = DoctorService::new(state.doctors.clone());

    let doctor = doctor_service.update_schedule(doctor_id, &actor, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule updated successfully",
        "data": {
            "doctorId": doctor.id,
            "schedule": doctor.schedule
        }
    })))
}
