use axum::{
    Router,
    routing::{get, put},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::DoctorState;

pub fn doctor_routes(state: DoctorState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{doctor_id}", get(handlers::get_doctor_public))
        .route("/{doctor_id}/schedule", get(handlers::get_doctor_schedule));

    // Template edits are limited to the doctor's hospital and the doctor
    let protected_routes = Router::new()
        .route("/{doctor_id}/schedule", put(handlers::update_doctor_schedule))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
