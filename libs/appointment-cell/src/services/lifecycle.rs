// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Principal, Role};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::store::{AppointmentStore, PrescriptionStore};

/// Statuses reachable from `current` in one step.
///
/// `confirmed -> completed` is listed, but only prescription issuance may
/// take it; [`AppointmentLifecycleService::set_status`] refuses it.
pub fn allowed_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
        AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

pub fn validate_status_transition(
    current: AppointmentStatus,
    new_status: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if allowed_transitions(current).contains(&new_status) {
        Ok(())
    } else {
        Err(AppointmentError::InvalidTransition { from: current, to: new_status })
    }
}

/// Whether `actor` is a party to the appointment.
pub fn is_participant(appointment: &Appointment, actor: &Principal) -> bool {
    match actor.role {
        Role::Patient => actor.id == appointment.patient_id,
        Role::Doctor => {
            actor.id == appointment.doctor_id
                && actor.tenant_id.map_or(true, |tenant| tenant == appointment.hospital_id)
        }
        Role::Hospital => actor.hospital_scope() == appointment.hospital_id,
        Role::Admin => false,
    }
}

/// Patients may only cancel; staff may also confirm.
fn role_may_set(role: Role, new_status: AppointmentStatus) -> bool {
    match role {
        Role::Patient => new_status == AppointmentStatus::Cancelled,
        Role::Doctor | Role::Hospital => {
            matches!(new_status, AppointmentStatus::Confirmed | AppointmentStatus::Cancelled)
        }
        Role::Admin => false,
    }
}

pub struct AppointmentLifecycleService {
    appointments: Arc<dyn AppointmentStore>,
    prescriptions: Arc<dyn PrescriptionStore>,
}

impl AppointmentLifecycleService {
    pub fn new(appointments: Arc<dyn AppointmentStore>, prescriptions: Arc<dyn PrescriptionStore>) -> Self {
        Self { appointments, prescriptions }
    }

    /// Loads an appointment, repairing it to `completed` when a prescription
    /// exists but the completion write never landed.
    pub async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.status == AppointmentStatus::Completed {
            return Ok(appointment);
        }

        match self.prescriptions.find_by_appointment(appointment_id).await? {
            Some(_) => self.repair_completed(appointment).await,
            None => Ok(appointment),
        }
    }

    async fn repair_completed(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        warn!(
            "Appointment {} is {} but has a prescription; marking completed",
            appointment.id, appointment.status
        );

        let expected = [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Cancelled,
        ];
        match self.appointments
            .update_status(appointment.id, &expected, AppointmentStatus::Completed)
            .await?
        {
            Some(repaired) => Ok(repaired),
            None => self.appointments
                .get(appointment.id)
                .await?
                .ok_or(AppointmentError::NotFound),
        }
    }

    /// Moves an appointment to a new status on behalf of `actor`.
    ///
    /// Checks run in order: existence, ownership, transition validity,
    /// role permission. The write itself is guarded by the status that was
    /// read, so a concurrent change surfaces as an invalid transition.
    pub async fn set_status(
        &self,
        appointment_id: Uuid,
        actor: &Principal,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;

        if !is_participant(&appointment, actor) {
            warn!("{} {} is not a party to appointment {}", actor.role, actor.id, appointment_id);
            return Err(AppointmentError::Forbidden("Not allowed to modify this appointment".to_string()));
        }

        let current = appointment.status;
        if new_status == AppointmentStatus::Completed {
            debug!("Completion of {} requested without a prescription", appointment_id);
            return Err(AppointmentError::InvalidTransition { from: current, to: new_status });
        }
        validate_status_transition(current, new_status)?;

        if !role_may_set(actor.role, new_status) {
            return Err(AppointmentError::Forbidden(format!(
                "A {} may not set an appointment to {}",
                actor.role, new_status
            )));
        }

        let updated = self.appointments
            .update_status(appointment_id, &[current], new_status)
            .await?
            .ok_or_else(|| {
                warn!("Appointment {} changed while moving {} -> {}", appointment_id, current, new_status);
                AppointmentError::InvalidTransition { from: current, to: new_status }
            })?;

        info!(
            "Appointment {} moved {} -> {} by {} {}",
            appointment_id, current, new_status, actor.role, actor.id
        );
        Ok(updated)
    }

    /// Attaches clinical notes; only the appointment's doctor or hospital.
    pub async fn add_notes(
        &self,
        appointment_id: Uuid,
        actor: &Principal,
        notes: &str,
    ) -> Result<Appointment, AppointmentError> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(AppointmentError::ValidationError("Notes must not be empty".to_string()));
        }

        let appointment = self.load(appointment_id).await?;
        if actor.role == Role::Patient || !is_participant(&appointment, actor) {
            return Err(AppointmentError::Forbidden("Not allowed to annotate this appointment".to_string()));
        }

        let updated = self.appointments
            .update_notes(appointment_id, notes)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        debug!("Notes updated on appointment {}", appointment_id);
        Ok(updated)
    }
}
