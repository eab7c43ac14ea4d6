pub mod slot;
pub mod conflict;
pub mod lifecycle;
pub mod calendar;
pub mod filter;
pub mod store;
pub mod supabase_store;
pub mod booking;

pub use slot::validate_slot;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use calendar::CalendarBuilder;
pub use filter::apply_filters;
pub use store::{AppointmentStore, InMemoryAppointmentStore, PhysicianDirectory, StoreError};
pub use supabase_store::SupabaseAppointmentStore;
pub use booking::AppointmentBookingService;
