// libs/appointment-cell/src/services/availability.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::{DayName, WeeklySchedule};
use doctor_cell::services::store::DoctorStore;

use crate::models::{AppointmentError, DayRange, SlotAvailability};
use crate::services::store::{AppointmentFilter, AppointmentStore};

pub struct AvailabilityService {
    doctors: Arc<dyn DoctorStore>,
    appointments: Arc<dyn AppointmentStore>,
}

impl AvailabilityService {
    pub fn new(doctors: Arc<dyn DoctorStore>, appointments: Arc<dyn AppointmentStore>) -> Self {
        Self { doctors, appointments }
    }

    /// Bookable slots of a doctor on a calendar date.
    ///
    /// Closed or unlisted days report `is_available = false` with no slots;
    /// that is a normal answer, not an error. Inactive doctors are not found.
    pub async fn resolve_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<SlotAvailability, AppointmentError> {
        let doctor = self.doctors
            .get_doctor(doctor_id)
            .await?
            .filter(|d| d.is_active)
            .ok_or(AppointmentError::DoctorNotFound)?;

        let open = doctor.schedule.day(DayName::of(date)).is_some_and(|day| day.is_available);
        let booked = if open {
            self.booked_slots(doctor_id, date).await?
        } else {
            Vec::new()
        };
        let availability = Self::compute(&doctor.schedule, date, booked);

        debug!(
            "Doctor {} on {} ({}): {} of {} slots free",
            doctor_id,
            date,
            availability.day_name,
            availability.available_slots.len(),
            availability.all_slots.len()
        );
        Ok(availability)
    }

    /// Slots held by pending or confirmed appointments on that day.
    pub async fn booked_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<String>, AppointmentError> {
        let filter = AppointmentFilter::active_for_day(doctor_id, DayRange::for_date(date));
        let mut booked: Vec<String> = self.appointments
            .find(&filter)
            .await?
            .into_iter()
            .map(|a| a.time_slot)
            .collect();

        booked.sort();
        booked.dedup();
        Ok(booked)
    }

    /// Closed or unlisted days report every list empty, whatever the
    /// template or the bookings say.
    pub fn compute(schedule: &WeeklySchedule, date: NaiveDate, booked_slots: Vec<String>) -> SlotAvailability {
        let day_name = DayName::of(date);

        let (is_available, all_slots, booked_slots) = match schedule.day(day_name) {
            Some(day) if day.is_available => (true, day.slots.clone(), booked_slots),
            _ => (false, Vec::new(), Vec::new()),
        };

        let taken: HashSet<&str> = booked_slots.iter().map(String::as_str).collect();
        let available_slots = all_slots
            .iter()
            .filter(|slot| !taken.contains(slot.as_str()))
            .cloned()
            .collect();

        SlotAvailability {
            date,
            day_name,
            is_available,
            all_slots,
            booked_slots,
            available_slots,
        }
    }
}
