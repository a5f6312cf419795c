pub mod availability;
pub mod booking;
pub mod directory;
pub mod lifecycle;
pub mod prescription;
pub mod query;
pub mod slot_lock;
pub mod store;

pub use availability::AvailabilityService;
pub use booking::BookingService;
pub use directory::DoctorDirectory;
pub use lifecycle::AppointmentLifecycleService;
pub use prescription::PrescriptionService;
pub use query::AppointmentQueryService;
pub use slot_lock::SlotLocks;
pub use store::{AppointmentStore, PrescriptionStore};
