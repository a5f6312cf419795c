use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Principal, Role};

use crate::models::{is_valid_slot_label, DaySchedule, Doctor, DoctorError, UpdateScheduleRequest, WeeklySchedule};
use crate::services::store::DoctorStore;

pub struct DoctorService {
    doctors: Arc<dyn DoctorStore>,
}

impl DoctorService {
    pub fn new(doctors: Arc<dyn DoctorStore>) -> Self {
        Self { doctors }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.doctors
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    /// Public reads treat a deactivated doctor as absent.
    pub async fn get_active_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        let doctor = self.get_doctor(doctor_id).await?;
        if doctor.is_active {
            Ok(doctor)
        } else {
            debug!("Doctor {} is inactive", doctor_id);
            Err(DoctorError::NotFound)
        }
    }

    /// Replace some or all days of a doctor's weekly template.
    ///
    /// Only the doctor's own hospital or the doctor may edit the template.
    /// Slot labels are validated and de-duplicated; their order is kept.
    pub async fn update_schedule(
        &self,
        doctor_id: Uuid,
        actor: &Principal,
        request: UpdateScheduleRequest,
    ) -> Result<Doctor, DoctorError> {
        debug!("Schedule update for doctor {} by {} {}", doctor_id, actor.role, actor.id);

        if request.days.is_empty() {
            return Err(DoctorError::ValidationError("At least one day must be provided".to_string()));
        }

        let doctor = self.get_doctor(doctor_id).await?;
        Self::authorize_schedule_edit(&doctor, actor)?;

        let mut cleaned = request.days;
        for (day, schedule) in cleaned.iter_mut() {
            *schedule = Self::normalize_day(schedule).map_err(|bad| {
                DoctorError::ValidationError(format!(
                    "Invalid slot label(s) for {}: {} (expected HH:MM)",
                    day,
                    bad.join(", ")
                ))
            })?;
        }

        let mut schedule: WeeklySchedule = doctor.schedule.clone();
        schedule.merge(cleaned);

        let updated = self.doctors
            .update_schedule(doctor_id, &schedule)
            .await?
            .ok_or(DoctorError::NotFound)?;

        info!("Weekly schedule updated for doctor {}", doctor_id);
        Ok(updated)
    }

    fn authorize_schedule_edit(doctor: &Doctor, actor: &Principal) -> Result<(), DoctorError> {
        let allowed = match actor.role {
            Role::Hospital => actor.hospital_scope() == doctor.hospital_id,
            Role::Doctor => {
                actor.id == doctor.id
                    && actor.tenant_id.map_or(true, |tenant| tenant == doctor.hospital_id)
            }
            Role::Patient | Role::Admin => false,
        };

        if allowed {
            Ok(())
        } else {
            warn!("Rejected schedule edit of doctor {} by {} {}", doctor.id, actor.role, actor.id);
            Err(DoctorError::Forbidden("Not allowed to edit this doctor's schedule".to_string()))
        }
    }

    fn normalize_day(day: &DaySchedule) -> Result<DaySchedule, Vec<String>> {
        let bad: Vec<String> = day.slots
            .iter()
            .filter(|slot| !is_valid_slot_label(slot))
            .cloned()
            .collect();
        if !bad.is_empty() {
            return Err(bad);
        }

        let mut seen = HashSet::new();
        let slots = day.slots
            .iter()
            .filter(|slot| seen.insert(slot.as_str()))
            .cloned()
            .collect();

        Ok(DaySchedule { slots, is_available: day.is_available })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    use crate::models::DayName;
    use crate::services::store::InMemoryDoctorStore;

    fn setup() -> (DoctorService, Doctor) {
        let store = Arc::new(InMemoryDoctorStore::new());
        let doctor = Doctor::new(
            Uuid::new_v4(),
            "Dr. Rahman",
            "Cardiology",
            WeeklySchedule::new().with_day(DayName::Monday, DaySchedule::open(["09:00", "10:00"])),
        );
        store.insert(doctor.clone());
        (DoctorService::new(store), doctor)
    }

    fn request(day: DayName, schedule: DaySchedule) -> UpdateScheduleRequest {
        let mut days = BTreeMap::new();
        days.insert(day, schedule);
        UpdateScheduleRequest { days }
    }

    #[tokio::test]
    async fn hospital_updates_one_day_and_keeps_others() {
        let (service, doctor) = setup();
        let actor = Principal::hospital(doctor.hospital_id);

        let updated = service
            .update_schedule(doctor.id, &actor, request(DayName::Friday, DaySchedule::open(["14:00", "14:00", "15:00"])))
            .await
            .unwrap();

        assert_eq!(updated.schedule.day(DayName::Friday).unwrap().slots, vec!["14:00", "15:00"]);
        assert_eq!(updated.schedule.day(DayName::Monday).unwrap().slots, vec!["09:00", "10:00"]);
    }

    #[tokio::test]
    async fn other_hospital_is_forbidden() {
        let (service, doctor) = setup();
        let actor = Principal::hospital(Uuid::new_v4());

        let result = service
            .update_schedule(doctor.id, &actor, request(DayName::Friday, DaySchedule::closed()))
            .await;

        assert_matches!(result, Err(DoctorError::Forbidden(_)));
    }

    #[tokio::test]
    async fn bad_slot_labels_are_rejected() {
        let (service, doctor) = setup();
        let actor = Principal::doctor(doctor.id, doctor.hospital_id);

        let result = service
            .update_schedule(doctor.id, &actor, request(DayName::Monday, DaySchedule::open(["9am"])))
            .await;

        assert_matches!(result, Err(DoctorError::ValidationError(msg)) if msg.contains("9am"));
    }

    #[tokio::test]
    async fn unknown_doctor_is_not_found() {
        let (service, _) = setup();
        let actor = Principal::hospital(Uuid::new_v4());

        let result = service
            .update_schedule(Uuid::new_v4(), &actor, request(DayName::Monday, DaySchedule::closed()))
            .await;

        assert_matches!(result, Err(DoctorError::NotFound));
    }
}
