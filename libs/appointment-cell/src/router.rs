// libs/appointment-cell/src/router.rs
use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

/// Mounted under `/appointments`. Every route requires a bearer token.
pub fn appointment_routes(state: AppointmentState) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/stats", get(handlers::get_appointment_stats))
        .route("/{appointment_id}", get(handlers::get_appointment).put(handlers::update_appointment_status))
        .route("/{appointment_id}/notes", patch(handlers::add_appointment_notes))
        .route("/{appointment_id}/prescription", post(handlers::issue_prescription))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

/// Public slot lookup, merged into the `/doctors` tree.
pub fn slot_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/{doctor_id}/slots", get(handlers::get_doctor_slots))
        .with_state(state)
}

/// Mounted under `/prescriptions`.
pub fn prescription_routes(state: AppointmentState) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_prescriptions))
        .route("/{prescription_id}", get(handlers::get_prescription))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
