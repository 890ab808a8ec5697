use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;

use super::domain::{Appointment, AppointmentId, AppointmentStatus};
use crate::workflows::directory::{AgentId, ApplicantId};
use crate::workflows::persistence::RepositoryError;

/// Appointment storage. Implementations must reject, atomically with the write:
/// a second appointment for the same (agent, start) with
/// [`Constraint::AgentSlot`](crate::workflows::Constraint::AgentSlot), and a second pending
/// appointment for one applicant with
/// [`Constraint::ApplicantPendingAppointment`](crate::workflows::Constraint::ApplicantPendingAppointment).
pub trait AppointmentRepository: Send + Sync {
    fn insert_appointment(&self, appointment: Appointment)
        -> Result<Appointment, RepositoryError>;
    /// Replaces start/end/agent; the (agent, start) rule ignores the record being replaced.
    /// `AppointmentPending` unless the stored appointment is still pending.
    fn update_appointment(&self, appointment: Appointment) -> Result<(), RepositoryError>;
    /// Partial update that leaves every other field untouched. Only a pending appointment
    /// changes status; otherwise `AppointmentPending`.
    fn set_appointment_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<(), RepositoryError>;
    fn delete_appointment(&self, id: &AppointmentId) -> Result<Appointment, RepositoryError>;
    fn fetch_appointment(&self, id: &AppointmentId)
        -> Result<Option<Appointment>, RepositoryError>;
    fn pending_for_applicant(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Option<Appointment>, RepositoryError>;
    /// Agents holding any stored appointment that starts exactly at `start`.
    fn agents_booked_at(&self, start: DateTime<FixedOffset>) -> Result<Vec<AgentId>, RepositoryError>;
    /// Pending appointment count per agent.
    fn pending_load(&self) -> Result<HashMap<AgentId, usize>, RepositoryError>;
    fn appointments_for_agent(&self, agent: &AgentId) -> Result<Vec<Appointment>, RepositoryError>;

    fn has_pending_appointment(&self, applicant: &ApplicantId) -> Result<bool, RepositoryError> {
        Ok(self.pending_for_applicant(applicant)?.is_some())
    }
}
