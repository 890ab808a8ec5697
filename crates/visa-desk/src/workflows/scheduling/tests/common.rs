use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde_json::Value;

use crate::clock::FixedClock;
use crate::config::SchedulingConfig;
use crate::workflows::casework::StaticCatalog;
use crate::workflows::directory::{
    Agent, AgentId, Applicant, ApplicantId, DirectoryRepository, DirectoryService, NewApplicant,
};
use crate::workflows::persistence::{Constraint, RepositoryError};
use crate::workflows::scheduling::{
    Appointment, AppointmentId, AppointmentRepository, AppointmentStatus, SchedulingService,
};
use crate::workflows::InMemoryStore;

pub(super) fn offset() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).expect("valid offset")
}

/// Local wall-clock instant in the agency's offset.
pub(super) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    offset()
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("unambiguous instant")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Monday 2024-06-10 09:00, the slot most scenarios book.
pub(super) fn monday_nine() -> DateTime<FixedOffset> {
    at(2024, 6, 10, 9, 0)
}

pub(super) struct Harness<S: AppointmentRepository + DirectoryRepository + 'static> {
    pub(super) store: Arc<S>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) scheduling: Arc<SchedulingService<S>>,
    pub(super) directory: DirectoryService<S, StaticCatalog>,
}

pub(super) fn harness(now: DateTime<FixedOffset>) -> Harness<InMemoryStore> {
    harness_with(SchedulingConfig::default(), now)
}

pub(super) fn harness_with(
    config: SchedulingConfig,
    now: DateTime<FixedOffset>,
) -> Harness<InMemoryStore> {
    harness_on(Arc::new(InMemoryStore::default()), config, now)
}

pub(super) fn harness_on<S>(
    store: Arc<S>,
    config: SchedulingConfig,
    now: DateTime<FixedOffset>,
) -> Harness<S>
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    let clock = Arc::new(FixedClock::new(now));
    let scheduling = Arc::new(SchedulingService::new(store.clone(), clock.clone(), config));
    let directory = DirectoryService::new(store.clone(), Arc::new(StaticCatalog::standard()));
    Harness {
        store,
        clock,
        scheduling,
        directory,
    }
}

impl<S: AppointmentRepository + DirectoryRepository + 'static> Harness<S> {
    pub(super) fn applicant(&self, name: &str) -> ApplicantId {
        self.directory
            .register_applicant(NewApplicant {
                name: name.to_string(),
                ..NewApplicant::default()
            })
            .expect("applicant registered")
            .id
    }

    pub(super) fn agent(&self, name: &str) -> Agent {
        self.directory.register_agent(name).expect("agent registered")
    }
}

/// Store that reports the first `races` appointment inserts as lost (agent, start) races.
#[derive(Default)]
pub(super) struct RacingStore {
    pub(super) inner: InMemoryStore,
    races: AtomicUsize,
    pub(super) inserts: AtomicUsize,
}

impl RacingStore {
    pub(super) fn losing(races: usize) -> Self {
        Self {
            races: AtomicUsize::new(races),
            ..Self::default()
        }
    }
}

impl DirectoryRepository for RacingStore {
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        self.inner.insert_applicant(applicant)
    }
    fn update_applicant(&self, applicant: Applicant) -> Result<(), RepositoryError> {
        self.inner.update_applicant(applicant)
    }
    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.fetch_applicant(id)
    }
    fn insert_agent(&self, agent: Agent) -> Result<Agent, RepositoryError> {
        self.inner.insert_agent(agent)
    }
    fn update_agent(&self, agent: Agent) -> Result<(), RepositoryError> {
        self.inner.update_agent(agent)
    }
    fn fetch_agent(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        self.inner.fetch_agent(id)
    }
    fn agents(&self) -> Result<Vec<Agent>, RepositoryError> {
        self.inner.agents()
    }
}

impl AppointmentRepository for RacingStore {
    fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let lost = self
            .races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lost {
            return Err(RepositoryError::Conflict(Constraint::AgentSlot));
        }
        self.inner.insert_appointment(appointment)
    }
    fn update_appointment(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        self.inner.update_appointment(appointment)
    }
    fn set_appointment_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.set_appointment_status(id, status)
    }
    fn delete_appointment(&self, id: &AppointmentId) -> Result<Appointment, RepositoryError> {
        self.inner.delete_appointment(id)
    }
    fn fetch_appointment(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        self.inner.fetch_appointment(id)
    }
    fn pending_for_applicant(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        self.inner.pending_for_applicant(applicant)
    }
    fn agents_booked_at(&self, start: DateTime<FixedOffset>) -> Result<Vec<AgentId>, RepositoryError> {
        self.inner.agents_booked_at(start)
    }
    fn pending_load(&self) -> Result<HashMap<AgentId, usize>, RepositoryError> {
        self.inner.pending_load()
    }
    fn appointments_for_agent(&self, agent: &AgentId) -> Result<Vec<Appointment>, RepositoryError> {
        self.inner.appointments_for_agent(agent)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
