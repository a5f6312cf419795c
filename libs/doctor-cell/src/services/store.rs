use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{eq, in_list, SupabaseClient};

use crate::models::{Doctor, DoctorError, WeeklySchedule};

/// Persistence seam for doctor records.
#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    /// Batch lookup; ids with no row are skipped.
    async fn get_doctors(&self, doctor_ids: &[Uuid]) -> Result<Vec<Doctor>, DoctorError>;

    /// Writes a new weekly template; `None` when the doctor does not exist.
    async fn update_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &WeeklySchedule,
    ) -> Result<Option<Doctor>, DoctorError>;
}

// ==============================================================================
// SUPABASE (POSTGREST)
// ==============================================================================

pub struct SupabaseDoctorStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorStore {
    const TABLE: &'static str = "doctors";

    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DoctorStore for SupabaseDoctorStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        debug!("Fetching doctor {}", doctor_id);

        let mut rows: Vec<Doctor> = self.supabase
            .select(Self::TABLE, &[eq("id", doctor_id)])
            .await?;

        Ok(rows.pop())
    }

    async fn get_doctors(&self, doctor_ids: &[Uuid]) -> Result<Vec<Doctor>, DoctorError> {
        if doctor_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Fetching {} doctors", doctor_ids.len());

        let rows: Vec<Doctor> = self.supabase
            .select(Self::TABLE, &[in_list("id", doctor_ids)])
            .await?;

        Ok(rows)
    }

    async fn update_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &WeeklySchedule,
    ) -> Result<Option<Doctor>, DoctorError> {
        debug!("Updating weekly schedule for doctor {}", doctor_id);

        let changes = json!({
            "schedule": schedule,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let mut rows: Vec<Doctor> = self.supabase
            .update(Self::TABLE, &[eq("id", doctor_id)], changes)
            .await?;

        Ok(rows.pop())
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryDoctorStore {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doctor: Doctor) {
        self.doctors.write().insert(doctor.id, doctor);
    }
}

#[async_trait]
impl DoctorStore for InMemoryDoctorStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.read().get(&doctor_id).cloned())
    }

    async fn get_doctors(&self, doctor_ids: &[Uuid]) -> Result<Vec<Doctor>, DoctorError> {
        let doctors = self.doctors.read();
        Ok(doctor_ids.iter().filter_map(|id| doctors.get(id).cloned()).collect())
    }

    async fn update_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &WeeklySchedule,
    ) -> Result<Option<Doctor>, DoctorError> {
        let mut doctors = self.doctors.write();
        Ok(doctors.get_mut(&doctor_id).map(|doctor| {
            doctor.schedule = schedule.clone();
            doctor.updated_at = Utc::now();
            doctor.clone()
        }))
    }
}
