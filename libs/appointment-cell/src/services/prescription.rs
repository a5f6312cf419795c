// libs/appointment-cell/src/services/prescription.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::services::store::DoctorStore;
use shared_models::auth::{Principal, Role};

use crate::models::{
    non_blank, Appointment, AppointmentError, AppointmentStatus, IssuePrescriptionRequest, Medicine,
    MedicineInput, Prescription, PrescriptionDetails,
};
use crate::services::directory::DoctorDirectory;
use crate::services::lifecycle::{is_participant, validate_status_transition};
use crate::services::store::{AppointmentStore, PrescriptionFilter, PrescriptionStore, PRESCRIPTION_EXISTS};

pub struct PrescriptionService {
    appointments: Arc<dyn AppointmentStore>,
    prescriptions: Arc<dyn PrescriptionStore>,
    directory: DoctorDirectory,
}

impl PrescriptionService {
    pub fn new(
        doctors: Arc<dyn DoctorStore>,
        appointments: Arc<dyn AppointmentStore>,
        prescriptions: Arc<dyn PrescriptionStore>,
    ) -> Self {
        Self { appointments, prescriptions, directory: DoctorDirectory::new(doctors) }
    }

    /// Records a prescription and completes the appointment.
    ///
    /// Only the attending doctor may issue, and only for a confirmed
    /// appointment without a prescription. The prescription row is the
    /// source of truth: if the completion write is lost afterwards the
    /// appointment is forced to `completed`, and reads repair it otherwise.
    #[instrument(skip(self, actor, request), fields(doctor_id = %actor.id))]
    pub async fn issue_prescription(
        &self,
        appointment_id: Uuid,
        actor: &Principal,
        request: IssuePrescriptionRequest,
    ) -> Result<Prescription, AppointmentError> {
        let (diagnosis, medicines) = Self::validate(&request)?;

        let appointment = self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if actor.role != Role::Doctor || !is_participant(&appointment, actor) {
            warn!("{} {} tried to prescribe for appointment {}", actor.role, actor.id, appointment_id);
            return Err(AppointmentError::Forbidden(
                "Only the attending doctor can issue a prescription".to_string(),
            ));
        }

        if self.prescriptions.find_by_appointment(appointment_id).await?.is_some() {
            return Err(AppointmentError::Conflict(PRESCRIPTION_EXISTS.to_string()));
        }

        if appointment.status != AppointmentStatus::Confirmed {
            return Err(AppointmentError::InvalidState(format!(
                "Appointment is {}; only confirmed appointments can be completed",
                appointment.status
            )));
        }
        validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        let prescription = Prescription {
            id: Uuid::new_v4(),
            appointment_id,
            hospital_id: appointment.hospital_id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            diagnosis,
            medicines,
            notes: non_blank(request.notes.as_deref()),
            created_at: Utc::now(),
        };

        let created = self.prescriptions.insert(&prescription).await?;
        self.complete(&appointment).await?;

        info!("Prescription {} issued for appointment {}", created.id, appointment_id);
        Ok(created)
    }

    async fn complete(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        let completed = self.appointments
            .update_status(appointment.id, &[AppointmentStatus::Confirmed], AppointmentStatus::Completed)
            .await?;
        if completed.is_some() {
            return Ok(());
        }

        warn!(
            "Appointment {} left confirmed while its prescription was written; forcing completed",
            appointment.id
        );
        let forced = self.appointments
            .update_status(
                appointment.id,
                &[AppointmentStatus::Pending, AppointmentStatus::Cancelled],
                AppointmentStatus::Completed,
            )
            .await?;
        if forced.is_none() {
            error!("Could not mark appointment {} completed", appointment.id);
        }
        Ok(())
    }

    /// Checks the whole request and reports every problem at once.
    fn validate(request: &IssuePrescriptionRequest) -> Result<(String, Vec<Medicine>), AppointmentError> {
        let mut problems = Vec::new();

        let diagnosis = non_blank(request.diagnosis.as_deref());
        if diagnosis.is_none() {
            problems.push("diagnosis is required".to_string());
        }
        if request.medicines.is_empty() {
            problems.push("at least one medicine is required".to_string());
        }

        let mut medicines = Vec::with_capacity(request.medicines.len());
        for (index, input) in request.medicines.iter().enumerate() {
            match Self::medicine(input) {
                Ok(medicine) => medicines.push(medicine),
                Err(missing) => problems.push(format!("medicines[{}]: missing {}", index, missing.join(", "))),
            }
        }

        match diagnosis {
            Some(diagnosis) if problems.is_empty() => Ok((diagnosis, medicines)),
            _ => Err(AppointmentError::ValidationError(problems.join("; "))),
        }
    }

    fn medicine(input: &MedicineInput) -> Result<Medicine, Vec<&'static str>> {
        let name = non_blank(input.name.as_deref());
        let dosage = non_blank(input.dosage.as_deref());
        let frequency = non_blank(input.frequency.as_deref());
        let duration = non_blank(input.duration.as_deref());

        match (name, dosage, frequency, duration) {
            (Some(name), Some(dosage), Some(frequency), Some(duration)) => Ok(Medicine {
                name,
                dosage,
                frequency,
                duration,
                instructions: non_blank(input.instructions.as_deref()),
            }),
            (name, dosage, frequency, duration) => {
                let fields = [("name", name), ("dosage", dosage), ("frequency", frequency), ("duration", duration)];
                Err(fields
                    .iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(field, _)| *field)
                    .collect())
            }
        }
    }

    pub async fn get_prescription(
        &self,
        prescription_id: Uuid,
        actor: &Principal,
    ) -> Result<PrescriptionDetails, AppointmentError> {
        let prescription = self.prescriptions
            .get(prescription_id)
            .await?
            .ok_or(AppointmentError::PrescriptionNotFound)?;

        let visible = match actor.role {
            Role::Patient => actor.id == prescription.patient_id,
            Role::Doctor => {
                actor.id == prescription.doctor_id
                    && actor.tenant_id.map_or(true, |tenant| tenant == prescription.hospital_id)
            }
            Role::Hospital => actor.hospital_scope() == prescription.hospital_id,
            Role::Admin => true,
        };

        if !visible {
            return Err(AppointmentError::PrescriptionNotFound);
        }

        let mut details = self.directory.prescriptions(std::slice::from_ref(&prescription)).await?;
        details.pop().ok_or(AppointmentError::PrescriptionNotFound)
    }

    pub async fn list_prescriptions(&self, actor: &Principal) -> Result<Vec<PrescriptionDetails>, AppointmentError> {
        let filter = match actor.role {
            Role::Patient => PrescriptionFilter { patient_id: Some(actor.id), ..Default::default() },
            Role::Doctor => PrescriptionFilter {
                doctor_id: Some(actor.id),
                hospital_id: actor.tenant_id,
                ..Default::default()
            },
            Role::Hospital => PrescriptionFilter { hospital_id: Some(actor.hospital_scope()), ..Default::default() },
            Role::Admin => PrescriptionFilter::default(),
        };

        let rows = self.prescriptions.find(&filter).await?;
        self.directory.prescriptions(&rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use doctor_cell::services::store::InMemoryDoctorStore;

    use crate::models::start_of_day;
    use crate::services::store::{InMemoryAppointmentStore, InMemoryPrescriptionStore};

    fn setup() -> (PrescriptionService, Arc<InMemoryAppointmentStore>) {
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let service = PrescriptionService::new(
            Arc::new(InMemoryDoctorStore::new()),
            appointments.clone(),
            Arc::new(InMemoryPrescriptionStore::new()),
        );
        (service, appointments)
    }

    async fn seed(store: &InMemoryAppointmentStore, status: AppointmentStatus) -> Appointment {
        let now = Utc::now();
        store
            .insert(&Appointment {
                id: Uuid::new_v4(),
                hospital_id: Uuid::new_v4(),
                doctor_id: Uuid::new_v4(),
                patient_id: Uuid::new_v4(),
                date: start_of_day(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()),
                time_slot: "10:00".to_string(),
                status,
                symptoms: None,
                notes: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    fn amoxicillin() -> MedicineInput {
        MedicineInput {
            name: Some("Amoxicillin".to_string()),
            dosage: Some("500mg".to_string()),
            frequency: Some("3x daily".to_string()),
            duration: Some("7 days".to_string()),
            instructions: None,
        }
    }

    fn request() -> IssuePrescriptionRequest {
        IssuePrescriptionRequest {
            diagnosis: Some("Tonsillitis".to_string()),
            medicines: vec![amoxicillin()],
            notes: None,
        }
    }

    fn attending(appointment: &Appointment) -> Principal {
        Principal::doctor(appointment.doctor_id, appointment.hospital_id)
    }

    #[tokio::test]
    async fn issuing_completes_the_appointment() {
        let (service, appointments) = setup();
        let appointment = seed(&appointments, AppointmentStatus::Confirmed).await;

        let prescription = service
            .issue_prescription(appointment.id, &attending(&appointment), request())
            .await
            .unwrap();

        assert_eq!(prescription.patient_id, appointment.patient_id);
        assert_eq!(prescription.medicines.len(), 1);
        let stored = appointments.get(appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn second_prescription_conflicts() {
        let (service, appointments) = setup();
        let appointment = seed(&appointments, AppointmentStatus::Confirmed).await;
        let doctor = attending(&appointment);

        service.issue_prescription(appointment.id, &doctor, request()).await.unwrap();
        let again = service.issue_prescription(appointment.id, &doctor, request()).await;

        assert_matches!(again, Err(AppointmentError::Conflict(_)));
    }

    #[tokio::test]
    async fn pending_appointment_is_invalid_state() {
        let (service, appointments) = setup();
        let appointment = seed(&appointments, AppointmentStatus::Pending).await;

        let result = service.issue_prescription(appointment.id, &attending(&appointment), request()).await;
        assert_matches!(result, Err(AppointmentError::InvalidState(_)));
    }

    #[tokio::test]
    async fn doctor_from_other_hospital_is_forbidden() {
        let (service, appointments) = setup();
        let appointment = seed(&appointments, AppointmentStatus::Confirmed).await;
        let outsider = Principal::doctor(appointment.doctor_id, Uuid::new_v4());

        let result = service.issue_prescription(appointment.id, &outsider, request()).await;
        assert_matches!(result, Err(AppointmentError::Forbidden(_)));

        let hospital = Principal::hospital(appointment.hospital_id);
        let result = service.issue_prescription(appointment.id, &hospital, request()).await;
        assert_matches!(result, Err(AppointmentError::Forbidden(_)));
    }

    #[tokio::test]
    async fn validation_lists_each_incomplete_medicine() {
        let (service, appointments) = setup();
        let appointment = seed(&appointments, AppointmentStatus::Confirmed).await;

        let mut bad = request();
        bad.medicines.push(MedicineInput { name: Some("Paracetamol".to_string()), ..Default::default() });

        let result = service.issue_prescription(appointment.id, &attending(&appointment), bad).await;
        assert_matches!(
            result,
            Err(AppointmentError::ValidationError(msg)) if msg == "medicines[1]: missing dosage, frequency, duration"
        );

        let stored = appointments.get(appointment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn empty_request_reports_diagnosis_and_medicines() {
        let (service, _) = setup();
        let result = service
            .issue_prescription(Uuid::new_v4(), &Principal::doctor(Uuid::new_v4(), Uuid::new_v4()), IssuePrescriptionRequest::default())
            .await;

        assert_matches!(
            result,
            Err(AppointmentError::ValidationError(msg)) if msg.contains("diagnosis") && msg.contains("medicine")
        );
    }

    #[tokio::test]
    async fn patients_only_see_their_own() {
        let (service, appointments) = setup();
        let appointment = seed(&appointments, AppointmentStatus::Confirmed).await;
        let prescription = service
            .issue_prescription(appointment.id, &attending(&appointment), request())
            .await
            .unwrap();

        let owner = Principal::patient(appointment.patient_id);
        assert!(service.get_prescription(prescription.id, &owner).await.is_ok());
        assert_eq!(service.list_prescriptions(&owner).await.unwrap().len(), 1);

        let stranger = Principal::patient(Uuid::new_v4());
        assert_matches!(
            service.get_prescription(prescription.id, &stranger).await,
            Err(AppointmentError::PrescriptionNotFound)
        );
        assert!(service.list_prescriptions(&stranger).await.unwrap().is_empty());
    }
}
