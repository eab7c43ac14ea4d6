// libs/appointment-cell/src/services/conflict.rs
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, ConflictCheckResponse};

/// Detects double-booking of a physician's slot. Only an exact
/// `(physician_id, date, time)` match with a non-cancelled appointment
/// conflicts; patients are free to hold overlapping visits with different
/// physicians.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetectionService;

impl ConflictDetectionService {
    pub fn new() -> Self {
        Self
    }

    /// The appointment already holding the slot, if any.
    pub fn find_conflict<'a>(
        &self,
        physician_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        existing_appointments: &'a [Appointment],
    ) -> Option<&'a Appointment> {
        self.find_conflict_excluding(physician_id, date, time, existing_appointments, None)
    }

    /// Like [`find_conflict`](Self::find_conflict) but ignores one appointment,
    /// used when an existing appointment is being moved back into its slot.
    pub fn find_conflict_excluding<'a>(
        &self,
        physician_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        existing_appointments: &'a [Appointment],
        exclude_appointment_id: Option<Uuid>,
    ) -> Option<&'a Appointment> {
        debug!("Checking slot {} {} for physician {} against {} appointments",
               date, time, physician_id, existing_appointments.len());

        let conflict = existing_appointments.iter().find(|appointment| {
            Some(appointment.id) != exclude_appointment_id
                && appointment.occupies_slot()
                && appointment.is_at(physician_id, date, time)
        });

        if let Some(conflicting) = conflict {
            warn!("Slot {} {} for physician {} already held by appointment {}",
                  date, time, physician_id, conflicting.id);
        }

        conflict
    }

    pub fn check_slot(
        &self,
        physician_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        existing_appointments: &[Appointment],
    ) -> ConflictCheckResponse {
        let conflicting_appointment = self
            .find_conflict(physician_id, date, time, existing_appointments)
            .cloned();

        ConflictCheckResponse {
            has_conflict: conflicting_appointment.is_some(),
            conflicting_appointment,
        }
    }
}
