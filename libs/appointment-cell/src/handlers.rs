// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_actor_role;

use crate::models::{
    hhmm, Actor, AppointmentError, AppointmentFilterCriteria, CancellationInfo, CreateAppointmentRequest,
    MonthViewQuery, StatusTransitionRequest, UpdateAppointmentDetailsRequest,
};
use crate::router::AppointmentState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub physician_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        let status = match &error {
            AppointmentError::PastDate
            | AppointmentError::PastTimeToday
            | AppointmentError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppointmentError::MissingCancellationReason
            | AppointmentError::CancellationDetailsTooShort { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppointmentError::SlotConflict { .. }
            | AppointmentError::IllegalTransition { .. }
            | AppointmentError::ConcurrentModification => StatusCode::CONFLICT,
            AppointmentError::NotFound => StatusCode::NOT_FOUND,
            AppointmentError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        AppError::Rejected {
            status,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

fn actor_from(user: &User) -> Result<Actor, AppError> {
    let role = require_actor_role(user)?;
    Ok(Actor::new(user.id.clone(), role))
}

/// Slots are local wall-clock times; the offset keeps the audit instant.
fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

// ==============================================================================
// SCHEDULING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = actor_from(&user)?;

    let appointment = state.booking.create_appointment(&actor, request, local_now()).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    }))))
}

#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<StatusTransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;

    let appointment = state.booking.transition_status(
        &actor,
        appointment_id,
        request.status,
        Some(request.cancellation),
        local_now(),
    ).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancellationInfo>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;

    let appointment = state.booking
        .cancel_appointment(&actor, appointment_id, request, local_now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentDetailsRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;

    let appointment = state.booking
        .update_details(&actor, appointment_id, request, local_now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// READ-SIDE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let appointment = state.booking.get_appointment(&actor, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_valid_transitions(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let (appointment, transitions) = state.booking.valid_transitions(&actor, appointment_id).await?;

    Ok(Json(json!({
        "appointment_id": appointment.id,
        "status": appointment.status,
        "valid_transitions": transitions
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(criteria): Query<AppointmentFilterCriteria>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let appointments = state.booking.search(&actor, criteria).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_month_view(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path((year, month)): Path<(i32, u32)>,
    Query(view): Query<MonthViewQuery>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let days = state.booking.get_month_view(&actor, year, month, view, local_now()).await?;

    Ok(Json(json!({
        "year": year,
        "month": month,
        "weeks": days.len() / 7,
        "days": days
    })))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let mut response = state.booking.check_slot(&query.physician_id, query.date, query.time).await?;

    // Other roles only learn that the slot is taken, not by whom.
    if let Some(conflicting) = &response.conflicting_appointment {
        if !actor.can_see(conflicting) {
            response.conflicting_appointment = None;
        }
    }

    Ok(Json(json!({
        "available": !response.has_conflict,
        "conflict": response
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from(&user)?;
    let stats = state.booking.stats(&actor).await?;

    Ok(Json(json!(stats)))
}
