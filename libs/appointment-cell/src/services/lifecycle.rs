// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CancellationInfo, CancellationReason,
};

/// Minimum length of the free-text explanation required with `other`.
pub const MIN_OTHER_DETAILS_LENGTH: usize = 5;

/// The appointment status machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {:?} to {:?}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {:?} -> {:?}", current_status, new_status);
            return Err(AppointmentError::IllegalTransition {
                from: *current_status,
                to: *new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Reactivation only
            AppointmentStatus::Cancelled => vec![AppointmentStatus::Scheduled],
            AppointmentStatus::NoShow => vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed,
            ],
            AppointmentStatus::Completed => vec![],
        }
    }

    pub fn is_reactivation(&self, from: &AppointmentStatus, to: &AppointmentStatus) -> bool {
        matches!(
            (from, to),
            (AppointmentStatus::Cancelled | AppointmentStatus::NoShow, AppointmentStatus::Scheduled)
        )
    }

    /// Checks the cancellation payload and returns the reason plus the
    /// trimmed details (if any).
    pub fn validate_cancellation(
        &self,
        cancellation: Option<&CancellationInfo>,
    ) -> Result<(CancellationReason, Option<String>), AppointmentError> {
        let reason = cancellation
            .and_then(|info| info.cancellation_reason)
            .ok_or(AppointmentError::MissingCancellationReason)?;

        let details = cancellation
            .and_then(|info| info.cancellation_details.as_deref())
            .map(str::trim)
            .filter(|details| !details.is_empty())
            .map(str::to_string);

        if reason == CancellationReason::Other {
            let length = details.as_deref().map_or(0, |d| d.chars().count());
            if length < MIN_OTHER_DETAILS_LENGTH {
                warn!("Cancellation with reason 'other' rejected: details too short ({} chars)", length);
                return Err(AppointmentError::CancellationDetailsTooShort {
                    min_length: MIN_OTHER_DETAILS_LENGTH,
                });
            }
        }

        Ok((reason, details))
    }

    /// Produces the updated record for a legal transition without touching
    /// the Record Store. Entering `cancelled` stamps the cancellation
    /// metadata; reactivation clears it.
    pub fn apply_transition(
        &self,
        appointment: &Appointment,
        new_status: AppointmentStatus,
        cancellation: Option<&CancellationInfo>,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.validate_status_transition(&appointment.status, &new_status)?;

        let mut updated = appointment.clone();
        updated.status = new_status;
        updated.updated_at = now;

        if new_status == AppointmentStatus::Cancelled {
            let (reason, details) = self.validate_cancellation(cancellation)?;
            let cancelled_by = cancellation
                .and_then(|info| info.cancelled_by.as_deref())
                .map(str::trim)
                .filter(|by| !by.is_empty())
                .unwrap_or(actor_id)
                .to_string();

            updated.cancellation_reason = Some(reason);
            updated.cancellation_details = details;
            updated.cancelled_by = Some(cancelled_by);
            updated.cancelled_at = Some(now);
        } else if self.is_reactivation(&appointment.status, &new_status) {
            updated.cancellation_reason = None;
            updated.cancellation_details = None;
            updated.cancelled_by = None;
            updated.cancelled_at = None;
        }

        info!("Appointment {} transition prepared: {} -> {}", appointment.id, appointment.status, new_status);
        Ok(updated)
    }
}
