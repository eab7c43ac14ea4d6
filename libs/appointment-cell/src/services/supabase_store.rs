// libs/appointment-cell/src/services/supabase_store.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, NewAppointment, PhysicianRoster,
};
use crate::services::store::{AppointmentStore, PhysicianDirectory, StoreError};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const PHYSICIANS_PATH: &str = "/rest/v1/physicians";

/// Record Store backed by PostgREST. Slot exclusivity relies on the unique
/// partial index
/// `appointments (physician_id, date, time) WHERE status <> 'cancelled'`,
/// which PostgREST reports as HTTP 409.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhysicianRow {
    id: String,
    specialty: Option<String>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, auth_token: None }
    }

    /// Sends `token` as the bearer on every request (row level security).
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));
        headers
    }

    fn list_path(query: &AppointmentQuery) -> String {
        let mut query_parts = Vec::new();

        if let Some(physician_id) = query.physician_id.as_deref() {
            query_parts.push(format!("physician_id=eq.{}", urlencoding::encode(physician_id)));
        }
        if let Some(patient_id) = query.patient_id.as_deref() {
            query_parts.push(format!("patient_id=eq.{}", urlencoding::encode(patient_id)));
        }
        if let Some(date) = query.date {
            query_parts.push(format!("date=eq.{}", date));
        }
        if let Some(from) = query.date_from {
            query_parts.push(format!("date=gte.{}", from));
        }
        if let Some(to) = query.date_to {
            query_parts.push(format!("date=lte.{}", to));
        }
        query_parts.push("order=date.asc,time.asc".to_string());

        format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&"))
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, StoreError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse appointments: {}", e)))
    }

    fn first_row(rows: Vec<Value>, action: &str) -> Result<Appointment, StoreError> {
        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Unavailable(format!("Failed to {} appointment: empty response", action)))
    }
}

/// Postgres `unique_violation`; the only 409 that means the slot is taken.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

fn map_supabase_error(error: SupabaseError) -> StoreError {
    match error {
        SupabaseError::Conflict(body) => {
            let detail: PostgrestError = serde_json::from_str(&body).unwrap_or_default();
            match detail.code.as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    warn!("Appointment slot constraint violated: {}", body);
                    StoreError::SlotTaken { conflicting_id: None }
                }
                code => {
                    warn!("Appointment write rejected by constraint {:?}: {}", code, body);
                    StoreError::ConstraintViolated(detail.message.unwrap_or(body))
                }
            }
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut appointment_data = serde_json::to_value(&new)
            .map_err(|e| StoreError::Unavailable(format!("Failed to encode appointment: {}", e)))?;
        if let Value::Object(fields) = &mut appointment_data {
            fields.insert("status".to_string(), json!(AppointmentStatus::Scheduled));
            fields.insert("updated_at".to_string(), json!(new.created_at));
        }

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            APPOINTMENTS_PATH,
            self.auth_token.as_deref(),
            Some(appointment_data),
            Some(Self::representation_headers()),
        ).await.map_err(map_supabase_error)?;

        let appointment = Self::first_row(rows, "create")?;
        info!("Appointment {} persisted for physician {} at {} {}",
              appointment.id, appointment.physician_id, appointment.date, appointment.time);
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            self.auth_token.as_deref(),
            None,
        ).await.map_err(map_supabase_error)?;

        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let path = Self::list_path(query);
        debug!("Listing appointments: {}", path);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            self.auth_token.as_deref(),
            None,
        ).await.map_err(map_supabase_error)?;

        Self::parse_rows(rows)
    }

    async fn update(
        &self,
        appointment: &Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS_PATH, appointment.id, expected_status);
        let update_data = json!({
            "status": appointment.status,
            "reason": appointment.reason,
            "priority": appointment.priority,
            "notes": appointment.notes,
            "cancellation_reason": appointment.cancellation_reason,
            "cancellation_details": appointment.cancellation_details,
            "cancelled_by": appointment.cancelled_by,
            "cancelled_at": appointment.cancelled_at,
            "updated_at": appointment.updated_at,
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            self.auth_token.as_deref(),
            Some(update_data),
            Some(Self::representation_headers()),
        ).await.map_err(map_supabase_error)?;

        if rows.is_empty() {
            // Nothing matched id + status: either gone or changed underneath us.
            return match self.get(appointment.id).await? {
                None => Err(StoreError::NotFound),
                Some(_) => Err(StoreError::StatusChanged { expected: expected_status }),
            };
        }

        Self::first_row(rows, "update")
    }
}

#[async_trait]
impl PhysicianDirectory for SupabaseAppointmentStore {
    async fn specialty_roster(&self) -> Result<PhysicianRoster, StoreError> {
        let path = format!("{}?select=id,specialty", PHYSICIANS_PATH);
        let rows: Vec<PhysicianRow> = self.supabase.request(
            Method::GET,
            &path,
            self.auth_token.as_deref(),
            None,
        ).await.map_err(map_supabase_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.specialty.map(|specialty| (row.id, specialty)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn list_path_pushes_filters_down() {
        let query = AppointmentQuery {
            physician_id: Some("dr smith".to_string()),
            date_from: NaiveDate::from_ymd_opt(2025, 7, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 7, 31),
            ..AppointmentQuery::default()
        };

        assert_eq!(
            SupabaseAppointmentStore::list_path(&query),
            "/rest/v1/appointments?physician_id=eq.dr%20smith&date=gte.2025-07-01&date=lte.2025-07-31&order=date.asc,time.asc"
        );
    }

    #[test]
    fn only_unique_violation_becomes_slot_taken() {
        let unique = json!({ "code": "23505", "message": "duplicate key value" }).to_string();
        assert_eq!(
            map_supabase_error(SupabaseError::Conflict(unique)),
            StoreError::SlotTaken { conflicting_id: None }
        );

        let foreign_key = json!({ "code": "23503", "message": "violates foreign key constraint" }).to_string();
        assert_eq!(
            map_supabase_error(SupabaseError::Conflict(foreign_key)),
            StoreError::ConstraintViolated("violates foreign key constraint".to_string())
        );
        // A body that isn't PostgREST JSON is not evidence of a taken slot
        assert!(matches!(
            map_supabase_error(SupabaseError::Conflict("conflict".to_string())),
            StoreError::ConstraintViolated(_)
        ));
        assert!(matches!(
            map_supabase_error(SupabaseError::Auth("jwt expired".to_string())),
            StoreError::Unavailable(_)
        ));
    }
}
