use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use uuid::Uuid;

use doctor_cell::models::DoctorSummary;
use doctor_cell::services::store::DoctorStore;

use crate::models::{Appointment, AppointmentDetails, AppointmentError, Prescription, PrescriptionDetails};

/// Resolves the doctor foreign key on appointment and prescription rows.
/// One batch lookup per response; a missing doctor leaves the summary empty.
pub struct DoctorDirectory {
    doctors: Arc<dyn DoctorStore>,
}

impl DoctorDirectory {
    pub fn new(doctors: Arc<dyn DoctorStore>) -> Self {
        Self { doctors }
    }

    async fn summaries<I>(&self, ids: I) -> Result<HashMap<Uuid, DoctorSummary>, AppointmentError>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let ids: Vec<Uuid> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(self.doctors
            .get_doctors(&ids)
            .await?
            .iter()
            .map(|doctor| (doctor.id, DoctorSummary::from(doctor)))
            .collect())
    }

    pub async fn appointments(&self, rows: &[Appointment]) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let doctors = self.summaries(rows.iter().map(|a| a.doctor_id)).await?;
        Ok(rows
            .iter()
            .map(|a| AppointmentDetails::from(a).with_doctor(doctors.get(&a.doctor_id).cloned()))
            .collect())
    }

    pub async fn prescriptions(&self, rows: &[Prescription]) -> Result<Vec<PrescriptionDetails>, AppointmentError> {
        let doctors = self.summaries(rows.iter().map(|p| p.doctor_id)).await?;
        Ok(rows
            .iter()
            .map(|p| PrescriptionDetails::from(p).with_doctor(doctors.get(&p.doctor_id).cloned()))
            .collect())
    }
}
