use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::{info, warn};

use super::allocator::{AgentSelectionPolicy, SlotAllocator};
use super::domain::{Appointment, AppointmentId, AppointmentStatus};
use super::repository::AppointmentRepository;
use super::rules::{days_until_start, validate_slot, SlotViolation};
use crate::clock::Clock;
use crate::config::SchedulingConfig;
use crate::error::ErrorKind;
use crate::workflows::directory::service::repository_kind;
use crate::workflows::directory::{Agent, AgentId, ApplicantId, DirectoryRepository};
use crate::workflows::persistence::{Constraint, RepositoryError, Sequence};

static APPOINTMENT_SEQUENCE: Sequence = Sequence::new("appt");

/// Searches repeated after losing an (agent, start) race before giving up.
const MAX_ALLOCATION_ATTEMPTS: usize = 3;

/// Service composing the slot rules, the allocator and the appointment store.
pub struct SchedulingService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
    allocator: SlotAllocator,
}

impl<S> SchedulingService<S>
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: SchedulingConfig) -> Self {
        let allocator = SlotAllocator::new(config.agent_policy);
        Self {
            store,
            clock,
            config,
            allocator,
        }
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// Books `requested_start` for the applicant with the first agent the policy selects.
    pub fn allocate(
        &self,
        applicant: &ApplicantId,
        requested_start: DateTime<FixedOffset>,
    ) -> Result<Appointment, SchedulingError> {
        self.store
            .fetch_applicant(applicant)?
            .ok_or_else(|| SchedulingError::not_found("applicant", &applicant.0))?;

        validate_slot(&self.config, self.clock.now(), requested_start)?;

        if self.store.has_pending_appointment(applicant)? {
            return Err(SchedulingError::DuplicateAppointment(applicant.clone()));
        }

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let agent = self.pick_agent(requested_start, None)?;
            let appointment = Appointment::pending(
                AppointmentId(APPOINTMENT_SEQUENCE.next()),
                applicant.clone(),
                agent.id.clone(),
                requested_start,
                self.config.appointment_duration,
            );

            match self.store.insert_appointment(appointment) {
                Ok(stored) => {
                    info!(
                        appointment = %stored.id,
                        applicant = %stored.applicant,
                        agent = %stored.agent,
                        start = %stored.start,
                        "appointment booked"
                    );
                    return Ok(stored);
                }
                Err(RepositoryError::Conflict(Constraint::AgentSlot)) => {
                    warn!(attempt, agent = %agent.id, start = %requested_start, "slot taken concurrently");
                }
                Err(RepositoryError::Conflict(Constraint::ApplicantPendingAppointment)) => {
                    return Err(SchedulingError::DuplicateAppointment(applicant.clone()));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SchedulingError::Conflict {
            start: requested_start,
        })
    }

    /// Deletes a pending appointment, freeing its slot, if enough notice is given.
    pub fn cancel(&self, id: &AppointmentId) -> Result<Appointment, SchedulingError> {
        let appointment = self.appointment(id)?;
        ensure_transition(&appointment, AppointmentStatus::Cancelled, "cancel")?;
        self.ensure_lead_time(
            &appointment,
            LeadTimeOperation::Cancel,
            self.config.min_cancel_lead_days,
        )?;

        let mut removed = self.store.delete_appointment(id)?;
        removed.status = AppointmentStatus::Cancelled;
        info!(appointment = %removed.id, applicant = %removed.applicant, "appointment cancelled");
        Ok(removed)
    }

    /// Moves a pending appointment to `new_start`, keeping the agent when they are free.
    pub fn reprogram(
        &self,
        id: &AppointmentId,
        new_start: DateTime<FixedOffset>,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.appointment(id)?;
        if !appointment.is_pending() {
            return Err(SchedulingError::InvalidTransition {
                action: "reprogram",
                status: appointment.status,
            });
        }
        self.ensure_lead_time(
            &appointment,
            LeadTimeOperation::Reprogram,
            self.config.min_reprogram_lead_days,
        )?;
        validate_slot(&self.config, self.clock.now(), new_start)?;

        if appointment.start == new_start {
            return Ok(appointment);
        }

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let agent = self.pick_agent(new_start, Some(&appointment.agent))?;
            let mut moved = appointment.clone();
            moved.move_to(agent.id.clone(), new_start, self.config.appointment_duration);

            match self.store.update_appointment(moved.clone()) {
                Ok(()) => {
                    let reassigned = moved.agent != appointment.agent;
                    info!(
                        appointment = %moved.id,
                        from = %appointment.start,
                        to = %moved.start,
                        agent = %moved.agent,
                        reassigned,
                        "appointment reprogrammed"
                    );
                    return Ok(moved);
                }
                Err(RepositoryError::Conflict(Constraint::AgentSlot)) => {
                    warn!(attempt, agent = %agent.id, start = %new_start, "slot taken concurrently");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SchedulingError::Conflict { start: new_start })
    }

    /// Completes the appointment on its scheduled day.
    pub fn mark_successful(&self, id: &AppointmentId) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.appointment(id)?;
        ensure_transition(&appointment, AppointmentStatus::Successful, "complete")?;

        let today = self.clock.today();
        let scheduled = self.clock.local_date(appointment.start);
        if scheduled != today {
            return Err(SchedulingError::NotAppointmentDay { scheduled, today });
        }

        self.store
            .set_appointment_status(id, AppointmentStatus::Successful)?;
        appointment.status = AppointmentStatus::Successful;
        info!(appointment = %appointment.id, "appointment completed");
        Ok(appointment)
    }

    /// Records a no-show; allowed from the scheduled day onwards.
    pub fn mark_failed(&self, id: &AppointmentId) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.appointment(id)?;
        ensure_transition(&appointment, AppointmentStatus::Failed, "fail")?;

        let scheduled = self.clock.local_date(appointment.start);
        if scheduled > self.clock.today() {
            return Err(SchedulingError::BeforeAppointmentDay { scheduled });
        }

        self.store
            .set_appointment_status(id, AppointmentStatus::Failed)?;
        appointment.status = AppointmentStatus::Failed;
        info!(appointment = %appointment.id, "appointment marked failed");
        Ok(appointment)
    }

    pub fn appointment(&self, id: &AppointmentId) -> Result<Appointment, SchedulingError> {
        self.store
            .fetch_appointment(id)?
            .ok_or_else(|| SchedulingError::not_found("appointment", &id.0))
    }

    pub fn pending_for(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.store.pending_for_applicant(applicant)?)
    }

    /// An agent's appointments on one local date, ordered by start.
    pub fn agenda(
        &self,
        agent: &AgentId,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut appointments: Vec<Appointment> = self
            .store
            .appointments_for_agent(agent)?
            .into_iter()
            .filter(|appointment| self.clock.local_date(appointment.start) == date)
            .collect();
        appointments.sort_by_key(|appointment| appointment.start);
        Ok(appointments)
    }

    fn pick_agent(
        &self,
        start: DateTime<FixedOffset>,
        preferred: Option<&AgentId>,
    ) -> Result<Agent, SchedulingError> {
        let agents = self.store.agents()?;
        let booked = self.store.agents_booked_at(start)?;

        if let Some(preferred) = preferred {
            let free = agents
                .iter()
                .find(|agent| &agent.id == preferred && agent.active && !booked.contains(preferred));
            if let Some(agent) = free {
                return Ok(agent.clone());
            }
        }

        let load = match self.allocator.policy() {
            AgentSelectionPolicy::LeastLoaded => self.store.pending_load()?,
            AgentSelectionPolicy::FirstAvailableByName => HashMap::new(),
        };

        self.allocator
            .select_agent(&agents, &booked, &load)
            .cloned()
            .ok_or(SchedulingError::NoAgentAvailable { start })
    }

    fn ensure_lead_time(
        &self,
        appointment: &Appointment,
        operation: LeadTimeOperation,
        required: i64,
    ) -> Result<(), SchedulingError> {
        let remaining = days_until_start(self.clock.now(), appointment.start);
        if remaining < required {
            return Err(SchedulingError::LeadTime {
                operation,
                required,
                remaining,
            });
        }
        Ok(())
    }
}

fn ensure_transition(
    appointment: &Appointment,
    next: AppointmentStatus,
    action: &'static str,
) -> Result<(), SchedulingError> {
    if appointment.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(SchedulingError::InvalidTransition {
            action,
            status: appointment.status,
        })
    }
}

/// Operation gated by a minimum notice period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadTimeOperation {
    Cancel,
    Reprogram,
}

impl fmt::Display for LeadTimeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadTimeOperation::Cancel => f.write_str("cancelling"),
            LeadTimeOperation::Reprogram => f.write_str("reprogramming"),
        }
    }
}

/// Error raised by the scheduling service.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error(transparent)]
    Validation(#[from] SlotViolation),
    #[error("applicant {0} already has a pending appointment; cancel it before booking another")]
    DuplicateAppointment(ApplicantId),
    #[error("no agent is available at {start}")]
    NoAgentAvailable { start: DateTime<FixedOffset> },
    #[error("{operation} requires {required} days notice; the appointment is {remaining} days away")]
    LeadTime {
        operation: LeadTimeOperation,
        required: i64,
        remaining: i64,
    },
    #[error("appointments can only be completed on their scheduled day ({scheduled}); today is {today}")]
    NotAppointmentDay { scheduled: NaiveDate, today: NaiveDate },
    #[error("the appointment on {scheduled} has not taken place yet")]
    BeforeAppointmentDay { scheduled: NaiveDate },
    #[error("cannot {action} an appointment that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: AppointmentStatus,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("the slot at {start} was taken by a concurrent booking; search again")]
    Conflict { start: DateTime<FixedOffset> },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SchedulingError {
    fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulingError::Validation(_)
            | SchedulingError::DuplicateAppointment(_)
            | SchedulingError::NoAgentAvailable { .. }
            | SchedulingError::LeadTime { .. }
            | SchedulingError::NotAppointmentDay { .. }
            | SchedulingError::BeforeAppointmentDay { .. }
            | SchedulingError::InvalidTransition { .. } => ErrorKind::Validation,
            SchedulingError::NotFound { .. } => ErrorKind::NotFound,
            SchedulingError::Conflict { .. } => ErrorKind::Conflict,
            SchedulingError::Repository(err) => repository_kind(err),
        }
    }
}
