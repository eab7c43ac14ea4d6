// libs/appointment-cell/src/services/filter.rs
use tracing::debug;

use crate::models::{Appointment, AppointmentFilterCriteria, PhysicianRoster};

/// Narrows `appointments` to those matching every present criterion. The
/// result keeps the input order. Specialty is resolved through `roster`; an
/// appointment whose physician is missing from the roster never matches a
/// specialty filter.
pub fn apply_filters(
    appointments: &[Appointment],
    criteria: &AppointmentFilterCriteria,
    roster: Option<&PhysicianRoster>,
) -> Vec<Appointment> {
    let filtered: Vec<Appointment> = appointments
        .iter()
        .filter(|appointment| matches_criteria(appointment, criteria, roster))
        .cloned()
        .collect();

    debug!("Filtered {} appointments down to {}", appointments.len(), filtered.len());
    filtered
}

pub fn matches_criteria(
    appointment: &Appointment,
    criteria: &AppointmentFilterCriteria,
    roster: Option<&PhysicianRoster>,
) -> bool {
    if let Some(patient_id) = criteria.patient_id.as_deref() {
        if appointment.patient_id != patient_id {
            return false;
        }
    }

    if let Some(physician_id) = criteria.physician_id.as_deref() {
        if appointment.physician_id != physician_id {
            return false;
        }
    }

    if let Some(specialty) = criteria.specialty.as_deref() {
        let physician_specialty = roster.and_then(|r| r.specialty_of(&appointment.physician_id));
        match physician_specialty {
            Some(found) if found.trim().eq_ignore_ascii_case(specialty.trim()) => {}
            _ => return false,
        }
    }

    if let Some(status) = criteria.status {
        if appointment.status != status {
            return false;
        }
    }

    if let Some(from) = criteria.date_from {
        if appointment.date < from {
            return false;
        }
    }

    if let Some(to) = criteria.date_to {
        if appointment.date > to {
            return false;
        }
    }

    true
}

impl AppointmentFilterCriteria {
    pub fn is_empty(&self) -> bool {
        *self == AppointmentFilterCriteria::default()
    }

    pub fn needs_roster(&self) -> bool {
        self.specialty.is_some()
    }
}
