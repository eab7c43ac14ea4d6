// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::ActorRole;

use crate::models::{
    Actor, Appointment, AppointmentError, AppointmentFilterCriteria, AppointmentQuery,
    AppointmentStats, AppointmentStatus, CancellationInfo, ConflictCheckResponse,
    CreateAppointmentRequest, DayCell, MonthViewQuery, NewAppointment, UpdateAppointmentDetailsRequest,
};
use crate::services::calendar::{self, CalendarBuilder};
use crate::services::conflict::ConflictDetectionService;
use crate::services::filter::apply_filters;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slot::validate_slot;
use crate::services::store::{AppointmentStore, PhysicianDirectory};

/// Entry point for every role-specific surface. Each call validates, checks
/// the slot, and only then touches the Record Store.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn PhysicianDirectory>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    default_visible_limit: usize,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn PhysicianDirectory>,
        default_visible_limit: usize,
    ) -> Self {
        Self {
            store,
            directory,
            conflict_service: ConflictDetectionService::new(),
            lifecycle_service: AppointmentLifecycleService::new(),
            default_visible_limit,
        }
    }

    /// Validate the slot, reject double-booking, then persist. The wall-clock
    /// part of `now` is the clinic's local time used for the past-slot check;
    /// the instant itself stamps `created_at`.
    pub async fn create_appointment(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<Appointment, AppointmentError> {
        let new_appointment = self.prepare_booking(actor, request, now)?;
        info!("Booking appointment for patient {} with physician {} at {} {} (by {} {})",
              new_appointment.patient_id, new_appointment.physician_id,
              new_appointment.date, new_appointment.time, actor.role, actor.id);

        validate_slot(new_appointment.date, new_appointment.time, now.naive_local()).map_err(|e| {
            warn!("Booking for {} {} rejected: {}", new_appointment.date, new_appointment.time, e);
            e
        })?;

        let existing = self.store.list(&AppointmentQuery {
            physician_id: Some(new_appointment.physician_id.clone()),
            date: Some(new_appointment.date),
            ..AppointmentQuery::default()
        }).await?;

        if let Some(conflicting) = self.conflict_service.find_conflict(
            &new_appointment.physician_id,
            new_appointment.date,
            new_appointment.time,
            &existing,
        ) {
            return Err(AppointmentError::SlotConflict { conflicting_id: Some(conflicting.id) });
        }

        let appointment = self.store.create(new_appointment).await?;
        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    /// Move an appointment through the status machine.
    pub async fn transition_status(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        cancellation: Option<CancellationInfo>,
        now: DateTime<FixedOffset>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Transitioning appointment {} to {} (by {} {})", appointment_id, new_status, actor.role, actor.id);

        let current = self.get_appointment(actor, appointment_id).await?;
        let updated = self.lifecycle_service.apply_transition(
            &current,
            new_status,
            cancellation.as_ref(),
            &actor.id,
            now.with_timezone(&Utc),
        )?;

        // The slot may have been re-booked while this appointment was inactive.
        if self.lifecycle_service.is_reactivation(&current.status, &new_status) {
            let existing = self.store.list(&AppointmentQuery {
                physician_id: Some(current.physician_id.clone()),
                date: Some(current.date),
                ..AppointmentQuery::default()
            }).await?;

            if let Some(conflicting) = self.conflict_service.find_conflict_excluding(
                &current.physician_id,
                current.date,
                current.time,
                &existing,
                Some(current.id),
            ) {
                warn!("Reactivation of {} rejected: slot now held by {}", current.id, conflicting.id);
                return Err(AppointmentError::SlotConflict { conflicting_id: Some(conflicting.id) });
            }
        }

        let saved = self.store.update(&updated, current.status).await?;
        info!("Appointment {} moved from {} to {}", saved.id, current.status, saved.status);
        Ok(saved)
    }

    pub async fn cancel_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        cancellation: CancellationInfo,
        now: DateTime<FixedOffset>,
    ) -> Result<Appointment, AppointmentError> {
        self.transition_status(actor, appointment_id, AppointmentStatus::Cancelled, Some(cancellation), now)
            .await
    }

    /// Month grid for the actor's scope. Physicians and patients are pinned
    /// to their own appointments whatever ids they pass.
    pub async fn get_month_view(
        &self,
        actor: &Actor,
        year: i32,
        month: u32,
        view: MonthViewQuery,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<DayCell>, AppointmentError> {
        let visible_limit = match view.visible {
            Some(limit) if !(1..=calendar::MAX_VISIBLE_LIMIT).contains(&limit) => {
                return Err(AppointmentError::ValidationFailed(format!(
                    "visible must be between 1 and {}",
                    calendar::MAX_VISIBLE_LIMIT
                )));
            }
            Some(limit) => limit,
            None => self.default_visible_limit,
        };

        let mut query = actor.scope_query();
        if actor.role.sees_all() {
            query.physician_id = blank_to_none(view.physician_id);
            query.patient_id = blank_to_none(view.patient_id);
        }
        query.date_from = Some(calendar::first_of_month(year, month)?);
        query.date_to = Some(calendar::last_of_month(year, month)?);

        let appointments = self.store.list(&query).await?;
        debug!("Month view {}-{:02} for {} {}: {} appointments", year, month, actor.role, actor.id, appointments.len());

        CalendarBuilder::new(visible_limit).build_month(year, month, &appointments, now.date_naive())
    }

    /// Facet search over the actor's scope.
    pub async fn search(
        &self,
        actor: &Actor,
        criteria: AppointmentFilterCriteria,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with filters: {:?}", criteria);

        let mut query = actor.scope_query();
        query.date_from = criteria.date_from;
        query.date_to = criteria.date_to;
        let appointments = self.store.list(&query).await?;

        let roster = if criteria.needs_roster() {
            Some(self.directory.specialty_roster().await?)
        } else {
            None
        };

        Ok(apply_filters(&appointments, &criteria, roster.as_ref()))
    }

    /// Out-of-scope appointments are reported as missing.
    pub async fn get_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(appointment_id).await?.ok_or(AppointmentError::NotFound)?;

        if !actor.can_see(&appointment) {
            warn!("{} {} tried to access appointment {} outside their scope", actor.role, actor.id, appointment_id);
            return Err(AppointmentError::NotFound);
        }

        Ok(appointment)
    }

    /// Availability check used by booking forms before submitting.
    pub async fn check_slot(
        &self,
        physician_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let existing = self.store.list(&AppointmentQuery {
            physician_id: Some(physician_id.to_string()),
            date: Some(date),
            ..AppointmentQuery::default()
        }).await?;

        Ok(self.conflict_service.check_slot(physician_id, date, time, &existing))
    }

    pub async fn valid_transitions(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<(Appointment, Vec<AppointmentStatus>), AppointmentError> {
        let appointment = self.get_appointment(actor, appointment_id).await?;
        let transitions = self.lifecycle_service.get_valid_transitions(&appointment.status);
        Ok((appointment, transitions))
    }

    /// Edits reason, priority and notes. Status, slot and cancellation data
    /// only change through [`transition_status`](Self::transition_status).
    pub async fn update_details(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: UpdateAppointmentDetailsRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(actor, appointment_id).await?;

        let mut updated = current.clone();
        if let Some(reason) = request.reason {
            updated.reason = blank_to_none(Some(reason));
        }
        if let Some(priority) = request.priority {
            updated.priority = priority;
        }
        if let Some(notes) = request.notes {
            updated.notes = blank_to_none(Some(notes));
        }
        updated.updated_at = now.with_timezone(&Utc);

        let saved = self.store.update(&updated, current.status).await?;
        info!("Appointment {} details updated", saved.id);
        Ok(saved)
    }

    pub async fn stats(&self, actor: &Actor) -> Result<AppointmentStats, AppointmentError> {
        let appointments = self.store.list(&actor.scope_query()).await?;

        let mut stats = AppointmentStats {
            total_appointments: appointments.len(),
            ..AppointmentStats::default()
        };
        for appointment in &appointments {
            match appointment.status {
                AppointmentStatus::Scheduled => stats.scheduled_appointments += 1,
                AppointmentStatus::Confirmed => stats.confirmed_appointments += 1,
                AppointmentStatus::Completed => stats.completed_appointments += 1,
                AppointmentStatus::Cancelled => stats.cancelled_appointments += 1,
                AppointmentStatus::NoShow => stats.no_show_appointments += 1,
            }
        }

        Ok(stats)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Pins ids to the actor where the role implies them and normalises
    /// free text.
    fn prepare_booking(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<NewAppointment, AppointmentError> {
        let mut patient_id = blank_to_none(request.patient_id);
        let mut physician_id = blank_to_none(request.physician_id);

        match actor.role {
            ActorRole::Patient => {
                patient_id = Some(own_id(actor, patient_id, "patient_id")?);
            }
            ActorRole::Physician => {
                physician_id = Some(own_id(actor, physician_id, "physician_id")?);
            }
            ActorRole::Admin | ActorRole::Assistant => {}
        }

        let patient_id = patient_id
            .ok_or_else(|| AppointmentError::ValidationFailed("patient_id is required".to_string()))?;
        let physician_id = physician_id
            .ok_or_else(|| AppointmentError::ValidationFailed("physician_id is required".to_string()))?;

        Ok(NewAppointment {
            patient_id,
            physician_id,
            date: request.date,
            time: request.time,
            reason: blank_to_none(request.reason),
            priority: request.priority.unwrap_or_default(),
            notes: blank_to_none(request.notes),
            created_at: now.with_timezone(&Utc),
        })
    }
}

/// Patients and physicians may only book for themselves.
fn own_id(actor: &Actor, supplied: Option<String>, field: &str) -> Result<String, AppointmentError> {
    match supplied {
        Some(id) if id != actor.id => {
            warn!("{} {} tried to book with {} = {}", actor.role, actor.id, field, id);
            Err(AppointmentError::ValidationFailed(format!(
                "{} must be your own id when booking as {}",
                field, actor.role
            )))
        }
        _ => Ok(actor.id.clone()),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
