// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::{eq, in_list, SupabaseClient};
use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, DayRange, Prescription};

pub const SLOT_TAKEN: &str = "This slot is already booked";
pub const PRESCRIPTION_EXISTS: &str = "Prescription already exists for this appointment";

/// Criteria for listing appointments. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub hospital_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub statuses: Option<Vec<AppointmentStatus>>,
    pub day: Option<DayRange>,
    pub time_slot: Option<String>,
}

impl AppointmentFilter {
    /// Active bookings of one doctor on one day.
    pub fn active_for_day(doctor_id: Uuid, day: DayRange) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            statuses: Some(AppointmentStatus::ACTIVE.to_vec()),
            day: Some(day),
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.hospital_id.map_or(true, |id| id == appointment.hospital_id)
            && self.doctor_id.map_or(true, |id| id == appointment.doctor_id)
            && self.patient_id.map_or(true, |id| id == appointment.patient_id)
            && self.statuses.as_ref().map_or(true, |s| s.contains(&appointment.status))
            && self.day.map_or(true, |day| day.contains(appointment.date))
            && self.time_slot.as_deref().map_or(true, |slot| slot == appointment.time_slot)
    }

    fn to_query(&self) -> Vec<(String, String)> {
        let mut filters = Vec::new();
        if let Some(id) = self.hospital_id {
            filters.push(eq("hospital_id", id));
        }
        if let Some(id) = self.doctor_id {
            filters.push(eq("doctor_id", id));
        }
        if let Some(id) = self.patient_id {
            filters.push(eq("patient_id", id));
        }
        if let Some(statuses) = &self.statuses {
            filters.push(in_list("status", statuses.iter()));
        }
        if let Some(day) = self.day {
            filters.push(("date".to_string(), format!("gte.{}", day.start.to_rfc3339_opts(SecondsFormat::Millis, true))));
            filters.push(("date".to_string(), format!("lte.{}", day.end.to_rfc3339_opts(SecondsFormat::Millis, true))));
        }
        if let Some(slot) = &self.time_slot {
            filters.push(eq("time_slot", slot));
        }
        filters
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrescriptionFilter {
    pub hospital_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub appointment_ids: Option<Vec<Uuid>>,
}

impl PrescriptionFilter {
    pub fn matches(&self, prescription: &Prescription) -> bool {
        self.hospital_id.map_or(true, |id| id == prescription.hospital_id)
            && self.doctor_id.map_or(true, |id| id == prescription.doctor_id)
            && self.patient_id.map_or(true, |id| id == prescription.patient_id)
            && self
                .appointment_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&prescription.appointment_id))
    }

    fn to_query(&self) -> Vec<(String, String)> {
        let mut filters = Vec::new();
        if let Some(id) = self.hospital_id {
            filters.push(eq("hospital_id", id));
        }
        if let Some(id) = self.doctor_id {
            filters.push(eq("doctor_id", id));
        }
        if let Some(id) = self.patient_id {
            filters.push(eq("patient_id", id));
        }
        if let Some(ids) = &self.appointment_ids {
            filters.push(in_list("appointment_id", ids.iter()));
        }
        filters
    }
}

/// Persistence seam for appointments.
///
/// Implementations must refuse a second active appointment for the same
/// doctor, day and slot, reporting it as [`AppointmentError::Conflict`].
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Matching appointments, newest day first and slots ascending within a day.
    async fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError>;

    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError>;

    /// Compare-and-set: writes `status` only while the stored status is one
    /// of `expected`. `None` when the row is missing or the guard failed.
    async fn update_status(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn update_notes(&self, id: Uuid, notes: &str) -> Result<Option<Appointment>, AppointmentError>;
}

/// Persistence seam for prescriptions; at most one per appointment.
#[async_trait]
pub trait PrescriptionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Prescription>, AppointmentError>;

    async fn find_by_appointment(&self, appointment_id: Uuid) -> Result<Option<Prescription>, AppointmentError>;

    /// Matching prescriptions, newest first.
    async fn find(&self, filter: &PrescriptionFilter) -> Result<Vec<Prescription>, AppointmentError>;

    async fn insert(&self, prescription: &Prescription) -> Result<Prescription, AppointmentError>;
}

fn unique_as_conflict(e: DatabaseError, message: &str) -> AppointmentError {
    match e {
        DatabaseError::UniqueViolation(detail) => {
            debug!("Unique constraint rejected write: {}", detail);
            AppointmentError::Conflict(message.to_string())
        }
        other => other.into(),
    }
}

fn sort_appointments(rows: &mut [Appointment]) {
    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.time_slot.cmp(&b.time_slot)));
}

// ==============================================================================
// SUPABASE (POSTGREST)
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    const TABLE: &'static str = "appointments";

    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let mut rows: Vec<Appointment> = self.supabase
            .select(Self::TABLE, &[eq("id", id)])
            .await?;
        Ok(rows.pop())
    }

    async fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query = filter.to_query();
        query.push(("order".to_string(), "date.desc,time_slot.asc".to_string()));

        let rows: Vec<Appointment> = self.supabase.select(Self::TABLE, &query).await?;
        debug!("Fetched {} appointments", rows.len());
        Ok(rows)
    }

    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let row = serde_json::to_value(appointment)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode appointment: {}", e)))?;

        self.supabase
            .insert(Self::TABLE, row)
            .await
            .map_err(|e| unique_as_conflict(e, SLOT_TAKEN))
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let filters = [eq("id", id), in_list("status", expected.iter())];
        let changes = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let mut rows: Vec<Appointment> = self.supabase
            .update(Self::TABLE, &filters, changes)
            .await?;
        Ok(rows.pop())
    }

    async fn update_notes(&self, id: Uuid, notes: &str) -> Result<Option<Appointment>, AppointmentError> {
        let changes = json!({
            "notes": notes,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let mut rows: Vec<Appointment> = self.supabase
            .update(Self::TABLE, &[eq("id", id)], changes)
            .await?;
        Ok(rows.pop())
    }
}

pub struct SupabasePrescriptionStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePrescriptionStore {
    const TABLE: &'static str = "prescriptions";

    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PrescriptionStore for SupabasePrescriptionStore {
    async fn get(&self, id: Uuid) -> Result<Option<Prescription>, AppointmentError> {
        let mut rows: Vec<Prescription> = self.supabase
            .select(Self::TABLE, &[eq("id", id)])
            .await?;
        Ok(rows.pop())
    }

    async fn find_by_appointment(&self, appointment_id: Uuid) -> Result<Option<Prescription>, AppointmentError> {
        let mut rows: Vec<Prescription> = self.supabase
            .select(Self::TABLE, &[eq("appointment_id", appointment_id)])
            .await?;
        if rows.len() > 1 {
            warn!("Appointment {} has {} prescriptions", appointment_id, rows.len());
        }
        Ok(rows.pop())
    }

    async fn find(&self, filter: &PrescriptionFilter) -> Result<Vec<Prescription>, AppointmentError> {
        let mut query = filter.to_query();
        query.push(("order".to_string(), "created_at.desc".to_string()));
        Ok(self.supabase.select(Self::TABLE, &query).await?)
    }

    async fn insert(&self, prescription: &Prescription) -> Result<Prescription, AppointmentError> {
        let row = serde_json::to_value(prescription)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode prescription: {}", e)))?;

        self.supabase
            .insert(Self::TABLE, row)
            .await
            .map_err(|e| unique_as_conflict(e, PRESCRIPTION_EXISTS))
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Process-local store; the uniqueness check and the insert share one write lock.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.appointments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.read().is_empty()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().get(&id).cloned())
    }

    async fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let mut rows: Vec<Appointment> = self.appointments
            .read()
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        sort_appointments(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write();

        if appointments.contains_key(&appointment.id) {
            return Err(AppointmentError::Conflict("Record already exists".to_string()));
        }

        if appointment.status.is_active() {
            let day = DayRange::for_date(appointment.calendar_date());
            let taken = appointments
                .values()
                .any(|a| a.holds_slot(appointment.doctor_id, &day, &appointment.time_slot));
            if taken {
                return Err(AppointmentError::Conflict(SLOT_TAKEN.to_string()));
            }
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.write();

        Ok(appointments
            .get_mut(&id)
            .filter(|a| expected.contains(&a.status))
            .map(|a| {
                a.status = status;
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn update_notes(&self, id: Uuid, notes: &str) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.write().get_mut(&id).map(|a| {
            a.notes = Some(notes.to_string());
            a.updated_at = Utc::now();
            a.clone()
        }))
    }
}

#[derive(Default)]
pub struct InMemoryPrescriptionStore {
    prescriptions: RwLock<HashMap<Uuid, Prescription>>,
}

impl InMemoryPrescriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrescriptionStore for InMemoryPrescriptionStore {
    async fn get(&self, id: Uuid) -> Result<Option<Prescription>, AppointmentError> {
        Ok(self.prescriptions.read().get(&id).cloned())
    }

    async fn find_by_appointment(&self, appointment_id: Uuid) -> Result<Option<Prescription>, AppointmentError> {
        Ok(self.prescriptions
            .read()
            .values()
            .find(|p| p.appointment_id == appointment_id)
            .cloned())
    }

    async fn find(&self, filter: &PrescriptionFilter) -> Result<Vec<Prescription>, AppointmentError> {
        let mut rows: Vec<Prescription> = self.prescriptions
            .read()
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, prescription: &Prescription) -> Result<Prescription, AppointmentError> {
        let mut prescriptions = self.prescriptions.write();
        if prescriptions.values().any(|p| p.appointment_id == prescription.appointment_id) {
            return Err(AppointmentError::Conflict(PRESCRIPTION_EXISTS.to_string()));
        }
        prescriptions.insert(prescription.id, prescription.clone());
        Ok(prescription.clone())
    }
}
