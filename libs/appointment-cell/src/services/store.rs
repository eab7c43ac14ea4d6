// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, NewAppointment,
    PhysicianRoster,
};
use crate::services::conflict::ConflictDetectionService;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The uniqueness constraint on active `(physician_id, date, time)` rejected the write.
    #[error("Slot already taken")]
    SlotTaken { conflicting_id: Option<Uuid> },

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment status changed concurrently (expected {expected})")]
    StatusChanged { expected: AppointmentStatus },

    /// Any other constraint rejected the write, e.g. an unknown patient or physician.
    #[error("Rejected by store constraint: {0}")]
    ConstraintViolated(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AppointmentError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::SlotTaken { conflicting_id } => AppointmentError::SlotConflict { conflicting_id },
            StoreError::NotFound => AppointmentError::NotFound,
            StoreError::StatusChanged { .. } => AppointmentError::ConcurrentModification,
            StoreError::ConstraintViolated(message) => AppointmentError::ValidationFailed(message),
            StoreError::Unavailable(message) => AppointmentError::StoreUnavailable(message),
        }
    }
}

/// Durable appointment storage. Implementations must enforce slot
/// exclusivity themselves: `create` and `update` fail with
/// [`StoreError::SlotTaken`] rather than letting two active appointments
/// share a slot, whatever the caller checked beforehand.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Persists a new `scheduled` appointment under a fresh id.
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Appointments matching `query`, ordered by date then time.
    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError>;

    /// Replaces the stored record if its status is still `expected_status`.
    async fn update(
        &self,
        appointment: &Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, StoreError>;
}

/// Source of the physician id -> specialty roster used by specialty search.
#[async_trait]
pub trait PhysicianDirectory: Send + Sync {
    async fn specialty_roster(&self) -> Result<PhysicianRoster, StoreError>;
}

/// Process-local store used for development and tests. A single write lock
/// makes check-and-insert atomic.
#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    roster: RwLock<PhysicianRoster>,
    conflicts: ConflictDetectionService,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(roster: PhysicianRoster) -> Self {
        Self {
            roster: RwLock::new(roster),
            ..Self::default()
        }
    }

    pub async fn register_physician(&self, physician_id: &str, specialty: &str) {
        self.roster.write().await.insert(physician_id, specialty);
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let existing: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.physician_id == new.physician_id && a.date == new.date)
            .cloned()
            .collect();
        if let Some(conflicting) = self.conflicts.find_conflict(&new.physician_id, new.date, new.time, &existing) {
            warn!("In-memory store rejected insert: slot held by {}", conflicting.id);
            return Err(StoreError::SlotTaken { conflicting_id: Some(conflicting.id) });
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            physician_id: new.physician_id,
            date: new.date,
            time: new.time,
            status: AppointmentStatus::Scheduled,
            reason: new.reason,
            priority: new.priority,
            notes: new.notes,
            cancellation_reason: None,
            cancellation_details: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        };

        appointments.insert(appointment.id, appointment.clone());
        debug!("In-memory store created appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appointment| query.matches(appointment))
            .cloned()
            .collect();

        appointments.sort_by(|a, b| {
            (a.date, a.time, a.created_at, a.id).cmp(&(b.date, b.time, b.created_at, b.id))
        });
        Ok(appointments)
    }

    async fn update(
        &self,
        appointment: &Appointment,
        expected_status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let current = appointments.get(&appointment.id).ok_or(StoreError::NotFound)?;
        if current.status != expected_status {
            warn!("Appointment {} is {} but {} was expected", appointment.id, current.status, expected_status);
            return Err(StoreError::StatusChanged { expected: expected_status });
        }

        if appointment.occupies_slot() {
            let same_slot: Vec<Appointment> = appointments
                .values()
                .filter(|a| a.physician_id == appointment.physician_id && a.date == appointment.date)
                .cloned()
                .collect();
            if let Some(conflicting) = self.conflicts.find_conflict_excluding(
                &appointment.physician_id,
                appointment.date,
                appointment.time,
                &same_slot,
                Some(appointment.id),
            ) {
                return Err(StoreError::SlotTaken { conflicting_id: Some(conflicting.id) });
            }
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }
}

#[async_trait]
impl PhysicianDirectory for InMemoryAppointmentStore {
    async fn specialty_roster(&self) -> Result<PhysicianRoster, StoreError> {
        Ok(self.roster.read().await.clone())
    }
}
