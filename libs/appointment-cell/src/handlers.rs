// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{principal_of, ApiJson, ApiPath, ApiQuery};

use crate::models::{
    parse_calendar_date, AddNotesRequest, AppointmentDetails, AppointmentError, AppointmentListQuery,
    AppointmentStatus, BookAppointmentRequest, BookingConfirmation, IssuePrescriptionRequest, PrescriptionDetails,
    SlotQuery, UpdateStatusRequest,
};
use crate::state::AppointmentState;

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_slots(
    State(state): State<AppointmentState>,
    ApiPath(doctor_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let raw = query
        .date
        .ok_or_else(|| AppError::ValidationError("Date is required".to_string()))?;
    let date = parse_calendar_date(&raw)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))?;

    let availability = state.availability_service().resolve_slots(doctor_id, date).await?;

    Ok(Json(json!({
        "success": true,
        "data": availability
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = principal_of(&user)?;
    if actor.role != Role::Patient {
        return Err(AppError::Forbidden("Only patients can book appointments".to_string()));
    }

    let appointment = state.booking_service().book_appointment(actor.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Appointment booked successfully",
            "data": BookingConfirmation::from(&appointment)
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    ApiQuery(query): ApiQuery<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let data = state.query_service().list_appointments(&actor, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": data.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let stats = state.query_service().stats(&actor).await?;

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    ApiPath(appointment_id): ApiPath<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let appointment = state.query_service().get_appointment(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

/// Patients may only cancel, and learn nothing about appointments they
/// cannot cancel beyond a 404.
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    ApiPath(appointment_id): ApiPath<Uuid>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let status: AppointmentStatus = request
        .status
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid status".to_string()))?;

    if actor.role == Role::Patient && status != AppointmentStatus::Cancelled {
        return Err(AppError::BadRequest("Invalid status".to_string()));
    }

    let result = state.lifecycle_service().set_status(appointment_id, &actor, status).await;
    let appointment = match result {
        Ok(appointment) => appointment,
        Err(
            AppointmentError::NotFound | AppointmentError::Forbidden(_) | AppointmentError::InvalidTransition { .. },
        ) if actor.role == Role::Patient => {
            return Err(AppError::NotFound("Appointment not found or cannot be cancelled".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(json!({
        "success": true,
        "message": format!("Appointment {}", appointment.status),
        "data": AppointmentDetails::from(&appointment)
    })))
}

#[axum::debug_handler]
pub async fn add_appointment_notes(
    State(state): State<AppointmentState>,
    ApiPath(appointment_id): ApiPath<Uuid>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<AddNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let appointment = state
        .lifecycle_service()
        .add_notes(appointment_id, &actor, &request.notes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Notes updated",
        "data": AppointmentDetails::from(&appointment)
    })))
}

#[axum::debug_handler]
pub async fn issue_prescription(
    State(state): State<AppointmentState>,
    ApiPath(appointment_id): ApiPath<Uuid>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<IssuePrescriptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = principal_of(&user)?;
    let prescription = state
        .prescription_service()
        .issue_prescription(appointment_id, &actor, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Prescription issued and appointment completed",
            "data": PrescriptionDetails::from(&prescription)
        })),
    ))
}

// ==============================================================================
// PRESCRIPTION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let data = state.prescription_service().list_prescriptions(&actor).await?;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "total": data.len()
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<AppointmentState>,
    ApiPath(prescription_id): ApiPath<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = principal_of(&user)?;
    let prescription = state.prescription_service().get_prescription(prescription_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "data": prescription
    })))
}
