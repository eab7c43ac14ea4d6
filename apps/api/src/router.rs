use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, AppointmentState};
use appointment_cell::services::booking::AppointmentBookingService;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, booking: AppointmentBookingService) -> Router {
    let appointments = AppointmentState::new(config, booking);

    Router::new()
        .route("/", get(|| async { "Clinic Scheduling API is running!" }))
        .nest("/appointments", appointment_routes(appointments))
}
