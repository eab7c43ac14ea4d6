use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::store::InMemoryAppointmentStore;
use appointment_cell::services::supabase_store::SupabaseAppointmentStore;
use shared_config::{AppConfig, StoreBackend};
use shared_database::supabase::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Clinic Scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    if config.supabase_jwt_secret.is_empty() {
        warn!("SUPABASE_JWT_SECRET is empty, every authenticated request will be rejected");
    }

    let booking = build_booking_service(&config);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config.clone(), booking)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}

fn build_booking_service(config: &AppConfig) -> AppointmentBookingService {
    match config.store_backend {
        StoreBackend::Supabase => {
            info!("Using Supabase appointment store at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            let store = Arc::new(SupabaseAppointmentStore::new(supabase));
            AppointmentBookingService::new(store.clone(), store, config.calendar_visible_limit)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory appointment store, data is lost on restart");
            let store = Arc::new(InMemoryAppointmentStore::new());
            AppointmentBookingService::new(store.clone(), store, config.calendar_visible_limit)
        }
    }
}
