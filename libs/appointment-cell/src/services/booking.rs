// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::{DayName, Doctor};
use doctor_cell::services::store::DoctorStore;

use crate::models::{
    non_blank, start_of_day, Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, DayRange,
};
use crate::services::slot_lock::{SlotKey, SlotLocks};
use crate::services::store::{AppointmentFilter, AppointmentStore, SLOT_TAKEN};

/// Validated booking input.
struct BookingSlot {
    doctor_id: Uuid,
    date: NaiveDate,
    time_slot: String,
    symptoms: Option<String>,
}

pub struct BookingService {
    doctors: Arc<dyn DoctorStore>,
    appointments: Arc<dyn AppointmentStore>,
    locks: Arc<SlotLocks>,
}

impl BookingService {
    pub fn new(
        doctors: Arc<dyn DoctorStore>,
        appointments: Arc<dyn AppointmentStore>,
        locks: Arc<SlotLocks>,
    ) -> Self {
        Self { doctors, appointments, locks }
    }

    /// Book a slot for a patient.
    ///
    /// The slot check and the insert run under a per-slot lock, and the
    /// store refuses a second active row for the same slot, so of any set
    /// of concurrent requests for one slot exactly one succeeds.
    #[instrument(
        skip(self, request),
        fields(doctor_id = tracing::field::Empty, date = tracing::field::Empty, time_slot = tracing::field::Empty)
    )]
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let slot = Self::validate_request(request)?;

        let span = tracing::Span::current();
        span.record("doctor_id", tracing::field::display(slot.doctor_id));
        span.record("date", tracing::field::display(slot.date));
        span.record("time_slot", slot.time_slot.as_str());

        if slot.date < Utc::now().date_naive() {
            return Err(AppointmentError::ValidationError("Cannot book appointments in the past".to_string()));
        }

        let doctor = self.active_doctor(slot.doctor_id).await?;
        Self::check_template(&doctor, slot.date, &slot.time_slot)?;

        let _guard = self.locks
            .acquire(SlotKey::new(slot.doctor_id, slot.date, &slot.time_slot))
            .await;

        let day = DayRange::for_date(slot.date);
        let mut filter = AppointmentFilter::active_for_day(slot.doctor_id, day);
        filter.time_slot = Some(slot.time_slot.clone());

        if !self.appointments.find(&filter).await?.is_empty() {
            debug!("Slot already held");
            return Err(AppointmentError::Conflict(SLOT_TAKEN.to_string()));
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            hospital_id: doctor.hospital_id,
            doctor_id: doctor.id,
            patient_id,
            date: start_of_day(slot.date),
            time_slot: slot.time_slot,
            status: AppointmentStatus::Pending,
            symptoms: slot.symptoms,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.appointments.insert(&appointment).await.map_err(|e| {
            if matches!(e, AppointmentError::Conflict(_)) {
                warn!("Store rejected duplicate booking for slot");
            }
            e
        })?;

        info!("Appointment {} booked for patient {}", created.id, patient_id);
        Ok(created)
    }

    fn validate_request(request: BookAppointmentRequest) -> Result<BookingSlot, AppointmentError> {
        let time_slot = non_blank(request.time_slot.as_deref());
        match (request.doctor_id, request.date, time_slot) {
            (Some(doctor_id), Some(date), Some(time_slot)) => Ok(BookingSlot {
                doctor_id,
                date,
                time_slot,
                symptoms: non_blank(request.symptoms.as_deref()),
            }),
            _ => Err(AppointmentError::ValidationError(
                "Doctor, date, and time slot are required".to_string(),
            )),
        }
    }

    async fn active_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        self.doctors
            .get_doctor(doctor_id)
            .await?
            .filter(|d| d.is_active)
            .ok_or(AppointmentError::DoctorNotFound)
    }

    fn check_template(doctor: &Doctor, date: NaiveDate, time_slot: &str) -> Result<(), AppointmentError> {
        let day_name = DayName::of(date);
        match doctor.schedule.day(day_name) {
            Some(day) if day.is_available => {}
            _ => {
                return Err(AppointmentError::ValidationError(format!(
                    "Doctor is not available on {}",
                    day_name
                )))
            }
        }

        if !doctor.schedule.offers(date, time_slot) {
            return Err(AppointmentError::ValidationError(format!(
                "Time slot {} is not offered on {}",
                time_slot, day_name
            )));
        }

        Ok(())
    }
}
