// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::{DayName, DoctorError, DoctorSummary};
use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// CALENDAR DATES
// ==============================================================================

/// Inclusive bounds of one calendar day, `00:00:00.000` to `23:59:59.999` UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayRange {
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1) - Duration::milliseconds(1);
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Midnight of the given day; appointments store their date in this form.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    DayRange::for_date(date).start
}

/// Parses `YYYY-MM-DD`, or an RFC 3339 timestamp taken as the calendar day
/// in its own offset.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

pub mod calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer};

    use super::parse_calendar_date;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => parse_calendar_date(value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", value))),
        }
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that hold a slot.
    pub const ACTIVE: [AppointmentStatus; 2] = [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

    pub fn is_active(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::ValidationError(format!("Invalid status '{}'", other))),
        }
    }
}

/// Stored appointment row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    /// Midnight (UTC) of the booked day.
    pub date: DateTime<Utc>,
    pub time_slot: String,
    pub status: AppointmentStatus,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn calendar_date(&self) -> NaiveDate {
        self.date.date_naive()
    }

    pub fn day_name(&self) -> DayName {
        DayName::of(self.calendar_date())
    }

    /// Whether this record occupies the given (doctor, day, slot).
    pub fn holds_slot(&self, doctor_id: Uuid, day: &DayRange, time_slot: &str) -> bool {
        self.status.is_active()
            && self.doctor_id == doctor_id
            && day.contains(self.date)
            && self.time_slot == time_slot
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    #[serde(default, deserialize_with = "calendar_date::deserialize")]
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddNotesRequest {
    pub notes: String,
}

/// Which slice of a patient's appointments to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentView {
    Upcoming,
    Past,
    #[default]
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Uuid>,
    #[serde(default, deserialize_with = "calendar_date::deserialize")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub view: AppointmentView,
}

/// Returned to the booking client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub id: Uuid,
    pub date: NaiveDate,
    pub time_slot: String,
    pub status: AppointmentStatus,
}

impl From<&Appointment> for BookingConfirmation {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            date: appointment.calendar_date(),
            time_slot: appointment.time_slot.clone(),
            status: appointment.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDetails {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub day_name: DayName,
    pub time_slot: String,
    pub status: AppointmentStatus,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorSummary>,
}

impl AppointmentDetails {
    pub fn with_doctor(mut self, doctor: Option<DoctorSummary>) -> Self {
        self.doctor = doctor;
        self
    }
}

impl From<&Appointment> for AppointmentDetails {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            hospital_id: appointment.hospital_id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            date: appointment.calendar_date(),
            day_name: appointment.day_name(),
            time_slot: appointment.time_slot.clone(),
            status: appointment.status,
            symptoms: appointment.symptoms.clone(),
            notes: appointment.notes.clone(),
            created_at: appointment.created_at,
            doctor: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub today_count: usize,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub date: NaiveDate,
    pub day_name: DayName,
    pub is_available: bool,
    /// Every slot the template lists for this weekday, in template order.
    #[serde(rename = "slots")]
    pub all_slots: Vec<String>,
    pub booked_slots: Vec<String>,
    pub available_slots: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: Option<String>,
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medicine {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub diagnosis: String,
    pub medicines: Vec<Medicine>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Medicine entry as submitted; every field may be missing until validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineInput {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssuePrescriptionRequest {
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medicines: Vec<MedicineInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDetails {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub diagnosis: String,
    pub medicines: Vec<Medicine>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorSummary>,
}

impl PrescriptionDetails {
    pub fn with_doctor(mut self, doctor: Option<DoctorSummary>) -> Self {
        self.doctor = doctor;
        self
    }
}

impl From<&Prescription> for PrescriptionDetails {
    fn from(p: &Prescription) -> Self {
        Self {
            id: p.id,
            appointment_id: p.appointment_id,
            hospital_id: p.hospital_id,
            doctor_id: p.doctor_id,
            patient_id: p.patient_id,
            diagnosis: p.diagnosis.clone(),
            medicines: p.medicines.clone(),
            notes: p.notes.clone(),
            created_at: p.created_at,
            doctor: None,
        }
    }
}

/// Trims an optional text field, treating blank as absent.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Data store unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Unavailable(msg) => AppointmentError::ServiceUnavailable(msg),
            DatabaseError::UniqueViolation(_) => AppointmentError::Conflict("Record already exists".to_string()),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            DoctorError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            DoctorError::ServiceUnavailable(msg) => AppointmentError::ServiceUnavailable(msg),
            DoctorError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PrescriptionNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            AppointmentError::InvalidState(msg) => AppError::Conflict(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::ServiceUnavailable(msg) => AppError::ServiceUnavailable(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
