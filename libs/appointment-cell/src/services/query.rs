// libs/appointment-cell/src/services/query.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::services::store::DoctorStore;
use shared_models::auth::{Principal, Role};

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AppointmentListQuery, AppointmentStats, AppointmentStatus,
    AppointmentView, DayRange,
};
use crate::services::directory::DoctorDirectory;
use crate::services::lifecycle::{is_participant, AppointmentLifecycleService};
use crate::services::store::{AppointmentFilter, AppointmentStore, PrescriptionFilter, PrescriptionStore};

/// Role-scoped reads over appointments, joined with their doctor.
pub struct AppointmentQueryService {
    appointments: Arc<dyn AppointmentStore>,
    prescriptions: Arc<dyn PrescriptionStore>,
    directory: DoctorDirectory,
}

impl AppointmentQueryService {
    pub fn new(
        doctors: Arc<dyn DoctorStore>,
        appointments: Arc<dyn AppointmentStore>,
        prescriptions: Arc<dyn PrescriptionStore>,
    ) -> Self {
        Self { appointments, prescriptions, directory: DoctorDirectory::new(doctors) }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        actor: &Principal,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let lifecycle = AppointmentLifecycleService::new(self.appointments.clone(), self.prescriptions.clone());
        let appointment = lifecycle.load(appointment_id).await?;

        if actor.role != Role::Admin && !is_participant(&appointment, actor) {
            return Err(AppointmentError::NotFound);
        }

        let mut details = self.directory.appointments(std::slice::from_ref(&appointment)).await?;
        details.pop().ok_or(AppointmentError::NotFound)
    }

    pub async fn list_appointments(
        &self,
        actor: &Principal,
        query: &AppointmentListQuery,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let mut filter = Self::scope(actor);
        // Any stored status may read back as completed once prescribed.
        filter.statuses = query
            .status
            .filter(|s| *s != AppointmentStatus::Completed)
            .map(|s| vec![s]);
        filter.day = query.date.map(DayRange::for_date);
        if let Some(doctor_id) = query.doctor_id {
            if actor.role == Role::Doctor && doctor_id != actor.id {
                return Ok(Vec::new());
            }
            filter.doctor_id = Some(doctor_id);
        }

        let mut rows = self.appointments.find(&filter).await?;
        self.overlay_completed(&mut rows).await?;
        if let Some(status) = query.status {
            rows.retain(|a| a.status == status);
        }

        let today = Utc::now().date_naive();
        rows.retain(|a| match query.view {
            AppointmentView::All => true,
            AppointmentView::Upcoming => a.status.is_active() && a.calendar_date() >= today,
            AppointmentView::Past => a.status.is_terminal() || a.calendar_date() < today,
        });
        if query.view == AppointmentView::Upcoming {
            rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time_slot.cmp(&b.time_slot)));
        }

        debug!("{} {} listed {} appointments", actor.role, actor.id, rows.len());
        self.directory.appointments(&rows).await
    }

    /// Dashboard counters for a hospital.
    pub async fn stats(&self, actor: &Principal) -> Result<AppointmentStats, AppointmentError> {
        if actor.role != Role::Hospital {
            return Err(AppointmentError::Forbidden("Only hospitals can view appointment stats".to_string()));
        }

        let mut rows = self.appointments.find(&Self::scope(actor)).await?;
        self.overlay_completed(&mut rows).await?;

        let today = DayRange::for_date(Utc::now().date_naive());
        Ok(AppointmentStats {
            total: rows.len(),
            pending: rows.iter().filter(|a| a.status == AppointmentStatus::Pending).count(),
            confirmed: rows.iter().filter(|a| a.status == AppointmentStatus::Confirmed).count(),
            today_count: rows.iter().filter(|a| today.contains(a.date)).count(),
        })
    }

    fn scope(actor: &Principal) -> AppointmentFilter {
        match actor.role {
            Role::Patient => AppointmentFilter { patient_id: Some(actor.id), ..Default::default() },
            Role::Doctor => AppointmentFilter {
                doctor_id: Some(actor.id),
                hospital_id: actor.tenant_id,
                ..Default::default()
            },
            Role::Hospital => AppointmentFilter { hospital_id: Some(actor.hospital_scope()), ..Default::default() },
            Role::Admin => AppointmentFilter::default(),
        }
    }

    /// Reports prescribed appointments as completed even if the stored
    /// status lags behind.
    async fn overlay_completed(&self, rows: &mut [Appointment]) -> Result<(), AppointmentError> {
        let open: Vec<Uuid> = rows
            .iter()
            .filter(|a| a.status != AppointmentStatus::Completed)
            .map(|a| a.id)
            .collect();
        if open.is_empty() {
            return Ok(());
        }

        let filter = PrescriptionFilter { appointment_ids: Some(open), ..Default::default() };
        let prescribed: HashSet<Uuid> = self.prescriptions
            .find(&filter)
            .await?
            .into_iter()
            .map(|p| p.appointment_id)
            .collect();

        for appointment in rows.iter_mut().filter(|a| prescribed.contains(&a.id)) {
            appointment.status = AppointmentStatus::Completed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveDate};

    use doctor_cell::models::{Doctor, WeeklySchedule};
    use doctor_cell::services::store::InMemoryDoctorStore;

    use crate::models::{start_of_day, Prescription};
    use crate::services::store::{InMemoryAppointmentStore, InMemoryPrescriptionStore};

    struct Fixture {
        service: AppointmentQueryService,
        appointments: Arc<InMemoryAppointmentStore>,
        prescriptions: Arc<InMemoryPrescriptionStore>,
        hospital_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
    }

    fn fixture() -> Fixture {
        let hospital_id = Uuid::new_v4();
        let doctor = Doctor::new(hospital_id, "Dr. Haque", "Pulmonology", WeeklySchedule::new());
        let doctors = Arc::new(InMemoryDoctorStore::new());
        doctors.insert(doctor.clone());

        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let prescriptions = Arc::new(InMemoryPrescriptionStore::new());
        Fixture {
            service: AppointmentQueryService::new(doctors, appointments.clone(), prescriptions.clone()),
            appointments,
            prescriptions,
            hospital_id,
            doctor_id: doctor.id,
            patient_id: Uuid::new_v4(),
        }
    }

    impl Fixture {
        async fn prescribe(&self, appointment: &Appointment) {
            self.prescriptions
                .insert(&Prescription {
                    id: Uuid::new_v4(),
                    appointment_id: appointment.id,
                    hospital_id: self.hospital_id,
                    doctor_id: self.doctor_id,
                    patient_id: self.patient_id,
                    diagnosis: "Flu".to_string(),
                    medicines: Vec::new(),
                    notes: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    }

    impl Fixture {
        async fn seed(&self, date: NaiveDate, slot: &str, status: AppointmentStatus) -> Appointment {
            let now = Utc::now();
            self.appointments
                .insert(&Appointment {
                    id: Uuid::new_v4(),
                    hospital_id: self.hospital_id,
                    doctor_id: self.doctor_id,
                    patient_id: self.patient_id,
                    date: start_of_day(date),
                    time_slot: slot.to_string(),
                    status,
                    symptoms: None,
                    notes: None,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn patient_views_split_upcoming_and_past() {
        let f = fixture();
        let today = Utc::now().date_naive();
        let upcoming = f.seed(today + Duration::days(3), "09:00", AppointmentStatus::Pending).await;
        f.seed(today - Duration::days(3), "09:00", AppointmentStatus::Confirmed).await;
        f.seed(today + Duration::days(4), "10:00", AppointmentStatus::Cancelled).await;

        let patient = Principal::patient(f.patient_id);
        let query = |view| AppointmentListQuery { view, ..Default::default() };

        let rows = f.service.list_appointments(&patient, &query(AppointmentView::Upcoming)).await.unwrap();
        assert_eq!(rows.iter().map(|a| a.id).collect::<Vec<_>>(), vec![upcoming.id]);

        let past = f.service.list_appointments(&patient, &query(AppointmentView::Past)).await.unwrap();
        assert_eq!(past.len(), 2);

        let all = f.service.list_appointments(&patient, &query(AppointmentView::All)).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn hospital_stats_count_today_and_status() {
        let f = fixture();
        let today = Utc::now().date_naive();
        f.seed(today, "09:00", AppointmentStatus::Pending).await;
        f.seed(today, "10:00", AppointmentStatus::Confirmed).await;
        f.seed(today + Duration::days(1), "09:00", AppointmentStatus::Pending).await;

        let stats = f.service.stats(&Principal::hospital(f.hospital_id)).await.unwrap();
        assert_eq!(stats, AppointmentStats { total: 3, pending: 2, confirmed: 1, today_count: 2 });

        let other = f.service.stats(&Principal::hospital(Uuid::new_v4())).await.unwrap();
        assert_eq!(other.total, 0);

        assert_matches!(
            f.service.stats(&Principal::patient(f.patient_id)).await,
            Err(AppointmentError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn prescribed_appointments_list_as_completed() {
        let f = fixture();
        let appointment = f.seed(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(), "09:00", AppointmentStatus::Confirmed).await;
        f.prescribe(&appointment).await;

        let doctor = Principal::doctor(f.doctor_id, f.hospital_id);
        let rows = f.service.list_appointments(&doctor, &AppointmentListQuery::default()).await.unwrap();
        assert_eq!(rows[0].status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn status_filter_applies_to_repaired_status() {
        let f = fixture();
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let prescribed = f.seed(date, "09:00", AppointmentStatus::Confirmed).await;
        let waiting = f.seed(date, "10:00", AppointmentStatus::Confirmed).await;
        f.prescribe(&prescribed).await;

        let hospital = Principal::hospital(f.hospital_id);
        let query = |status| AppointmentListQuery { status: Some(status), ..Default::default() };

        let confirmed = f.service.list_appointments(&hospital, &query(AppointmentStatus::Confirmed)).await.unwrap();
        assert_eq!(confirmed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![waiting.id]);

        let completed = f.service.list_appointments(&hospital, &query(AppointmentStatus::Completed)).await.unwrap();
        assert_eq!(completed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![prescribed.id]);
        assert_eq!(completed[0].status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn listed_and_single_reads_carry_the_doctor() {
        let f = fixture();
        let appointment = f.seed(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(), "09:00", AppointmentStatus::Pending).await;
        let patient = Principal::patient(f.patient_id);

        let rows = f.service.list_appointments(&patient, &AppointmentListQuery::default()).await.unwrap();
        let doctor = rows[0].doctor.as_ref().unwrap();
        assert_eq!(doctor.id, f.doctor_id);
        assert_eq!(doctor.name, "Dr. Haque");
        assert_eq!(doctor.specialization, "Pulmonology");

        let single = f.service.get_appointment(appointment.id, &patient).await.unwrap();
        assert_eq!(single.doctor.map(|d| d.id), Some(f.doctor_id));
    }

    #[tokio::test]
    async fn strangers_cannot_read_an_appointment() {
        let f = fixture();
        let appointment = f.seed(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(), "09:00", AppointmentStatus::Pending).await;

        assert!(f.service.get_appointment(appointment.id, &Principal::patient(f.patient_id)).await.is_ok());
        assert_matches!(
            f.service.get_appointment(appointment.id, &Principal::patient(Uuid::new_v4())).await,
            Err(AppointmentError::NotFound)
        );
    }
}
