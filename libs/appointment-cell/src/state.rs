use std::sync::Arc;

use doctor_cell::services::store::DoctorStore;
use shared_config::AppConfig;

use crate::services::store::{AppointmentStore, PrescriptionStore};
use crate::services::{
    AppointmentLifecycleService, AppointmentQueryService, AvailabilityService, BookingService, PrescriptionService,
    SlotLocks,
};

/// Shared handles for the appointment routes. One slot-lock registry per
/// process; every clone shares it.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub doctors: Arc<dyn DoctorStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub prescriptions: Arc<dyn PrescriptionStore>,
    pub slot_locks: Arc<SlotLocks>,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        doctors: Arc<dyn DoctorStore>,
        appointments: Arc<dyn AppointmentStore>,
        prescriptions: Arc<dyn PrescriptionStore>,
    ) -> Self {
        Self {
            config,
            doctors,
            appointments,
            prescriptions,
            slot_locks: Arc::new(SlotLocks::new()),
        }
    }

    pub fn availability_service(&self) -> AvailabilityService {
        AvailabilityService::new(self.doctors.clone(), self.appointments.clone())
    }

    pub fn booking_service(&self) -> BookingService {
        BookingService::new(self.doctors.clone(), self.appointments.clone(), self.slot_locks.clone())
    }

    pub fn lifecycle_service(&self) -> AppointmentLifecycleService {
        AppointmentLifecycleService::new(self.appointments.clone(), self.prescriptions.clone())
    }

    pub fn prescription_service(&self) -> PrescriptionService {
        PrescriptionService::new(self.doctors.clone(), self.appointments.clone(), self.prescriptions.clone())
    }

    pub fn query_service(&self) -> AppointmentQueryService {
        AppointmentQueryService::new(self.doctors.clone(), self.appointments.clone(), self.prescriptions.clone())
    }
}
