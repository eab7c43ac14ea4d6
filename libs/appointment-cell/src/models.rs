// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::fmt;

use shared_models::auth::ActorRole;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A booked visit. `(physician_id, date, time)` is the slot it occupies while
/// its status is anything other than `cancelled`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub physician_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<CancellationReason>,
    #[serde(default)]
    pub cancellation_details: Option<String>,
    #[serde(default)]
    pub cancelled_by: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Cancelled appointments release their slot so it can be re-booked.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn is_at(&self, physician_id: &str, date: NaiveDate, time: NaiveTime) -> bool {
        self.physician_id == physician_id && self.date == date && self.time == time
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

/// Why an appointment was cancelled. These values are shown to end users
/// and persisted verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    PatientRequest,
    PhysicianUnavailable,
    Emergency,
    Administrative,
    AdministrativeDecision,
    ScheduleConflict,
    SystemMaintenance,
    ForceMajeure,
    Other,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::PatientRequest => "patient_request",
            CancellationReason::PhysicianUnavailable => "physician_unavailable",
            CancellationReason::Emergency => "emergency",
            CancellationReason::Administrative => "administrative",
            CancellationReason::AdministrativeDecision => "administrative_decision",
            CancellationReason::ScheduleConflict => "schedule_conflict",
            CancellationReason::SystemMaintenance => "system_maintenance",
            CancellationReason::ForceMajeure => "force_majeure",
            CancellationReason::Other => "other",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cancellation payload. Field names match the persisted appointment columns
/// so it can be flattened into status-change requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CancellationInfo {
    #[serde(default)]
    pub cancellation_reason: Option<CancellationReason>,
    #[serde(default)]
    pub cancellation_details: Option<String>,
    #[serde(default)]
    pub cancelled_by: Option<String>,
}

impl CancellationInfo {
    pub fn new(reason: CancellationReason) -> Self {
        Self {
            cancellation_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.cancellation_details = Some(details.to_string());
        self
    }
}

/// The authenticated caller of a scheduling operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self { id: id.into(), role }
    }

    /// Physicians only see their own book, patients only their own visits.
    pub fn can_see(&self, appointment: &Appointment) -> bool {
        match self.role {
            ActorRole::Admin | ActorRole::Assistant => true,
            ActorRole::Physician => appointment.physician_id == self.id,
            ActorRole::Patient => appointment.patient_id == self.id,
        }
    }

    /// Store query restricted to what this actor may see.
    pub fn scope_query(&self) -> AppointmentQuery {
        match self.role {
            ActorRole::Admin | ActorRole::Assistant => AppointmentQuery::default(),
            ActorRole::Physician => AppointmentQuery {
                physician_id: Some(self.id.clone()),
                ..AppointmentQuery::default()
            },
            ActorRole::Patient => AppointmentQuery {
                patient_id: Some(self.id.clone()),
                ..AppointmentQuery::default()
            },
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub physician_id: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A validated booking handed to the Record Store.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: String,
    pub physician_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub reason: Option<String>,
    pub priority: Priority,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransitionRequest {
    pub status: AppointmentStatus,
    #[serde(flatten)]
    pub cancellation: CancellationInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentDetailsRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Search facets. Every present field narrows the result; absent fields
/// impose nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentFilterCriteria {
    pub patient_id: Option<String>,
    pub physician_id: Option<String>,
    pub specialty: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Filters a Record Store can push down to its backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentQuery {
    pub physician_id: Option<String>,
    pub patient_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.physician_id.as_deref().map_or(true, |id| appointment.physician_id == id)
            && self.patient_id.as_deref().map_or(true, |id| appointment.patient_id == id)
            && self.date.map_or(true, |d| appointment.date == d)
            && self.date_from.map_or(true, |d| appointment.date >= d)
            && self.date_to.map_or(true, |d| appointment.date <= d)
    }
}

/// physician id -> specialty, owned by the physician directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PhysicianRoster(HashMap<String, String>);

impl PhysicianRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, physician_id: impl Into<String>, specialty: impl Into<String>) {
        self.0.insert(physician_id.into(), specialty.into());
    }

    pub fn specialty_of(&self, physician_id: &str) -> Option<&str> {
        self.0.get(physician_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PhysicianRoster {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ==============================================================================
// CONFLICT DETECTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointment: Option<Appointment>,
}

// ==============================================================================
// CALENDAR MODELS
// ==============================================================================

/// One cell of the month grid. Cells of adjacent months only pad the grid
/// and never carry appointments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayCell {
    pub day: u32,
    pub date: String,
    pub is_other_month: bool,
    pub is_today: bool,
    pub appointments: Vec<Appointment>,
    pub visible_appointments: Vec<Appointment>,
    pub has_more: bool,
    pub hidden_count: usize,
}

/// Optional narrowing of a month view. Only honoured for staff roles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthViewQuery {
    pub physician_id: Option<String>,
    pub patient_id: Option<String>,
    /// How many appointments each cell shows before "more".
    pub visible: Option<usize>,
}

// ==============================================================================
// STATISTICS MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentStats {
    pub total_appointments: usize,
    pub scheduled_appointments: usize,
    pub confirmed_appointments: usize,
    pub completed_appointments: usize,
    pub cancelled_appointments: usize,
    pub no_show_appointments: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment date is in the past")]
    PastDate,

    #[error("Appointment time has already passed today")]
    PastTimeToday,

    #[error("Appointment slot not available, please choose another time")]
    SlotConflict { conflicting_id: Option<Uuid> },

    #[error("Validation error: {0}")]
    ValidationFailed(String),

    #[error("Appointment status cannot change from {from} to {to}")]
    IllegalTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("A cancellation reason is required")]
    MissingCancellationReason,

    #[error("Cancellation details must be at least {min_length} characters when the reason is 'other'")]
    CancellationDetailsTooShort { min_length: usize },

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment was modified by someone else, reload and try again")]
    ConcurrentModification,

    #[error("Appointment store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AppointmentError {
    /// Stable machine-readable kind for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppointmentError::PastDate => "past_date",
            AppointmentError::PastTimeToday => "past_time_today",
            AppointmentError::SlotConflict { .. } => "slot_conflict",
            AppointmentError::ValidationFailed(_) => "validation_failed",
            AppointmentError::IllegalTransition { .. } => "illegal_transition",
            AppointmentError::MissingCancellationReason => "missing_cancellation_reason",
            AppointmentError::CancellationDetailsTooShort { .. } => "cancellation_details_too_short",
            AppointmentError::NotFound => "not_found",
            AppointmentError::ConcurrentModification => "concurrent_modification",
            AppointmentError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Everything except a broken Record Store is an expected rejection.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AppointmentError::StoreUnavailable(_))
    }
}

// ==============================================================================
// WIRE FORMAT HELPERS
// ==============================================================================

/// `HH:MM` (zero-padded) time-of-day serialisation. Accepts `HH:MM:SS` on
/// input and drops the seconds.
pub mod hhmm {
    use chrono::{NaiveTime, Timelike};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        let raw = raw.trim();
        let parsed = NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, FORMAT))
            .map_err(|e| format!("invalid time '{}', expected HH:MM: {}", raw, e))?;

        NaiveTime::from_hms_opt(parsed.hour(), parsed.minute(), 0)
            .ok_or_else(|| format!("invalid time '{}'", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cancellation_reasons_round_trip_verbatim() {
        for raw in [
            "patient_request",
            "physician_unavailable",
            "emergency",
            "administrative",
            "administrative_decision",
            "schedule_conflict",
            "system_maintenance",
            "force_majeure",
            "other",
        ] {
            let reason: CancellationReason = serde_json::from_value(json!(raw)).unwrap();
            assert_eq!(serde_json::to_value(reason).unwrap(), json!(raw));
            assert_eq!(reason.as_str(), raw);
        }
    }

    #[test]
    fn time_is_written_as_hh_mm_and_seconds_are_dropped() {
        assert_eq!(hhmm::parse("09:05").unwrap(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert_eq!(hhmm::parse("14:30:59").unwrap(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert!(hhmm::parse("25:00").is_err());
        assert!(hhmm::parse("noon").is_err());
    }

    #[test]
    fn appointment_json_uses_business_vocabulary() {
        let appointment: Appointment = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "patient_id": "pat-1",
            "physician_id": "P1",
            "date": "2025-08-15",
            "time": "10:00:00",
            "status": "no_show",
            "created_at": "2025-08-01T09:00:00+00:00",
            "updated_at": "2025-08-01T11:00:00+02:00"
        }))
        .unwrap();

        assert_eq!(appointment.priority, Priority::Normal);
        assert_eq!(appointment.status, AppointmentStatus::NoShow);
        // timestamptz columns come back with an offset
        assert_eq!(appointment.created_at, appointment.updated_at);

        let value = serde_json::to_value(&appointment).unwrap();
        assert_eq!(value["time"], json!("10:00"));
        assert_eq!(value["status"], json!("no_show"));
        assert_eq!(value["priority"], json!("normal"));
    }

    #[test]
    fn physician_scope_only_sees_own_appointments() {
        let physician = Actor::new("P1", ActorRole::Physician);
        assert_eq!(physician.scope_query().physician_id.as_deref(), Some("P1"));
        assert_eq!(physician.scope_query().patient_id, None);

        let admin = Actor::new("A1", ActorRole::Admin);
        assert_eq!(admin.scope_query(), AppointmentQuery::default());
    }
}
