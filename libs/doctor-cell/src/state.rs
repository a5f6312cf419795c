use std::sync::Arc;

use shared_config::AppConfig;

use crate::services::store::DoctorStore;

#[derive(Clone)]
pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub doctors: Arc<dyn DoctorStore>,
}

impl DoctorState {
    pub fn new(config: Arc<AppConfig>, doctors: Arc<dyn DoctorStore>) -> Self {
        Self { config, doctors }
    }
}
