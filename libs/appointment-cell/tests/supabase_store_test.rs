use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, AppointmentQuery, AppointmentStatus, NewAppointment, Priority,
};
use appointment_cell::services::store::{AppointmentStore, PhysicianDirectory, StoreError};
use appointment_cell::services::supabase_store::SupabaseAppointmentStore;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn new_booking() -> NewAppointment {
    NewAppointment {
        patient_id: "pat-1".to_string(),
        physician_id: "P1".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        reason: Some("Checkup".to_string()),
        priority: Priority::High,
        notes: None,
        created_at: Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_create_posts_scheduled_row() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("apikey", "test-anon-key"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({
            "physician_id": "P1",
            "date": "2025-08-15",
            "time": "10:00",
            "status": "scheduled",
            "priority": "high"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(id, "pat-1", "P1", "2025-08-15", "10:00:00", "scheduled")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let created = store_for(&mock_server).create(new_booking()).await.unwrap();

    assert_eq!(created.id, id);
    assert_eq!(created.status, AppointmentStatus::Scheduled);
    assert_eq!(created.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    // timestamptz values keep their offset on the wire
    assert_eq!(created.created_at, Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
    assert_eq!(created.updated_at, created.created_at);
}

#[tokio::test]
async fn test_unique_index_violation_maps_to_slot_taken() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "duplicate key value violates unique constraint \"appointments_active_slot\"",
                "23505",
            ),
        ))
        .mount(&mock_server)
        .await;

    let result = store_for(&mock_server).create(new_booking()).await;

    assert_eq!(result, Err(StoreError::SlotTaken { conflicting_id: None }));
}

#[tokio::test]
async fn test_foreign_key_violation_is_not_a_slot_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "insert or update on table \"appointments\" violates foreign key constraint \"appointments_patient_id_fkey\"",
                "23503",
            ),
        ))
        .mount(&mock_server)
        .await;

    let result = store_for(&mock_server).create(new_booking()).await;

    assert_matches!(result, Err(StoreError::ConstraintViolated(ref message)) if message.contains("foreign key"));
    assert_matches!(
        result.map_err(AppointmentError::from),
        Err(AppointmentError::ValidationFailed(_))
    );
}

#[tokio::test]
async fn test_list_pushes_filters_to_postgrest() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("physician_id", "eq.P1"))
        .and(query_param("date", "eq.2025-08-15"))
        .and(query_param("order", "date.asc,time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(Uuid::new_v4(), "pat-1", "P1", "2025-08-15", "09:00:00", "confirmed"),
            MockSupabaseResponses::appointment_row(Uuid::new_v4(), "pat-2", "P1", "2025-08-15", "10:00:00", "cancelled"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = AppointmentQuery {
        physician_id: Some("P1".to_string()),
        date: NaiveDate::from_ymd_opt(2025, 8, 15),
        ..AppointmentQuery::default()
    };
    let appointments = store_for(&mock_server).list(&query).await.unwrap();

    assert_eq!(appointments.len(), 2);
    assert_eq!(appointments[1].status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_get_missing_row_is_none() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    assert_eq!(store_for(&mock_server).get(id).await, Ok(None));
}

#[tokio::test]
async fn test_update_guards_on_expected_status() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();
    let row = MockSupabaseResponses::appointment_row(id, "pat-1", "P1", "2025-08-15", "10:00", "scheduled");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", "eq.scheduled"))
        .and(body_partial_json(json!({ "status": "confirmed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The row exists but no longer has the expected status
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;

    let mut appointment: appointment_cell::models::Appointment = serde_json::from_value(row).unwrap();
    appointment.status = AppointmentStatus::Confirmed;

    let result = store_for(&mock_server)
        .update(&appointment, AppointmentStatus::Scheduled)
        .await;

    assert_eq!(result, Err(StoreError::StatusChanged { expected: AppointmentStatus::Scheduled }));
}

#[tokio::test]
async fn test_update_returns_persisted_row() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();
    let row = MockSupabaseResponses::appointment_row(id, "pat-1", "P1", "2025-08-15", "10:00", "confirmed");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;

    let appointment: appointment_cell::models::Appointment = serde_json::from_value(row).unwrap();
    let saved = store_for(&mock_server)
        .update(&appointment, AppointmentStatus::Scheduled)
        .await
        .unwrap();

    assert_eq!(saved.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn test_specialty_roster_skips_physicians_without_specialty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/physicians"))
        .and(query_param("select", "id,specialty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::physician_row("P1", "Cardiology"),
            { "id": "P2", "specialty": null },
        ])))
        .mount(&mock_server)
        .await;

    let roster = store_for(&mock_server).specialty_roster().await.unwrap();

    assert_eq!(roster.len(), 1);
    assert_eq!(roster.specialty_of("P1"), Some("Cardiology"));
    assert_eq!(roster.specialty_of("P2"), None);
}

#[tokio::test]
async fn test_server_errors_are_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&mock_server)
        .await;

    let result = store_for(&mock_server).list(&AppointmentQuery::default()).await;

    assert_matches!(result, Err(StoreError::Unavailable(_)));
}
