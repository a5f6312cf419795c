pub mod doctor;
pub mod store;

pub use doctor::DoctorService;
pub use store::{DoctorStore, InMemoryDoctorStore, SupabaseDoctorStore};
