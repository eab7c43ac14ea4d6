// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::AppointmentBookingService;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, booking: AppointmentBookingService) -> Self {
        Self {
            config,
            booking: Arc::new(booking),
        }
    }
}

pub fn appointment_routes(state: AppointmentState) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/search", get(handlers::search_appointments))
        .route("/calendar/{year}/{month}", get(handlers::get_month_view))
        .route("/availability", get(handlers::check_availability))
        .route("/stats", get(handlers::get_appointment_stats))
        .route("/{appointment_id}", get(handlers::get_appointment).patch(handlers::update_appointment))
        .route("/{appointment_id}/status", post(handlers::transition_status))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/transitions", get(handlers::get_valid_transitions))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
