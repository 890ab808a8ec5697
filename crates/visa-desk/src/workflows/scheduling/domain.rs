use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::workflows::directory::{AgentId, ApplicantId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Successful,
    Cancelled,
    Failed,
}

impl AppointmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Successful => "successful",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, AppointmentStatus::Pending)
    }

    pub const fn can_transition_to(self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (
                AppointmentStatus::Pending,
                AppointmentStatus::Successful
                    | AppointmentStatus::Cancelled
                    | AppointmentStatus::Failed
            )
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A scheduled slot between an applicant and an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub applicant: ApplicantId,
    pub agent: AgentId,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn pending(
        id: AppointmentId,
        applicant: ApplicantId,
        agent: AgentId,
        start: DateTime<FixedOffset>,
        duration: Duration,
    ) -> Self {
        Self {
            id,
            applicant,
            agent,
            start,
            end: start + duration,
            status: AppointmentStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == AppointmentStatus::Pending
    }

    /// Moves the slot in place; status stays pending.
    pub fn move_to(&mut self, agent: AgentId, start: DateTime<FixedOffset>, duration: Duration) {
        self.agent = agent;
        self.start = start;
        self.end = start + duration;
    }

    pub fn view(&self) -> AppointmentView {
        AppointmentView {
            appointment_id: self.id.clone(),
            applicant_id: self.applicant.clone(),
            agent_id: self.agent.clone(),
            start: self.start,
            end: self.end,
            status: self.status.label(),
        }
    }
}

/// Sanitized representation returned by the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    pub appointment_id: AppointmentId,
    pub applicant_id: ApplicantId,
    pub agent_id: AgentId,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub status: &'static str,
}
