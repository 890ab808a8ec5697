use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde_json::Value;

use crate::clock::{Clock, FixedClock};
use crate::config::SchedulingConfig;
use crate::workflows::casework::{
    BlobError, BlobRef, BlobStore, CaseFolder, CaseRepository, CaseworkService, DocumentId,
    DocumentVersion, FolderState, InMemoryBlobStore, NotificationAck, NotificationKind, Notifier,
    NotifyError, OutboxNotifier, Requirement, RequirementId, StaticCatalog,
};
use crate::workflows::directory::{
    Agent, AgentId, Applicant, ApplicantId, DirectoryRepository, DirectoryService, NewApplicant,
};
use crate::workflows::persistence::{Constraint, RepositoryError};
use crate::workflows::scheduling::{
    Appointment, AppointmentId, AppointmentRepository, AppointmentStatus, SchedulingService,
};
use crate::workflows::InMemoryStore;

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    FixedOffset::west_opt(5 * 3600)
        .expect("valid offset")
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("unambiguous instant")
}

pub(super) type Casework<S, N> = CaseworkService<S, StaticCatalog, InMemoryBlobStore, N>;

pub(super) struct CaseHarness<S, N>
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    N: Notifier + 'static,
{
    pub(super) store: Arc<S>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) blobs: Arc<InMemoryBlobStore>,
    pub(super) notifier: Arc<N>,
    pub(super) scheduling: SchedulingService<S>,
    pub(super) directory: DirectoryService<S, StaticCatalog>,
    pub(super) casework: Arc<Casework<S, N>>,
}

pub(super) fn harness() -> CaseHarness<InMemoryStore, OutboxNotifier> {
    build(
        Arc::new(InMemoryStore::default()),
        StaticCatalog::standard(),
        Arc::new(OutboxNotifier::new()),
    )
}

pub(super) fn build<S, N>(store: Arc<S>, catalog: StaticCatalog, notifier: Arc<N>) -> CaseHarness<S, N>
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    N: Notifier + 'static,
{
    let clock = Arc::new(FixedClock::new(at(2024, 6, 3, 8, 0)));
    let catalog = Arc::new(catalog);
    let blobs = Arc::new(InMemoryBlobStore::new());
    let scheduling =
        SchedulingService::new(store.clone(), clock.clone(), SchedulingConfig::default());
    let directory = DirectoryService::new(store.clone(), catalog.clone());
    let casework = Arc::new(CaseworkService::new(
        store.clone(),
        catalog,
        blobs.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    CaseHarness {
        store,
        clock,
        blobs,
        notifier,
        scheduling,
        directory,
        casework,
    }
}

/// Applicant (with a dedicated agent) booked for Monday 2024-06-10 09:00.
pub(super) struct Booked {
    pub(super) applicant: ApplicantId,
    pub(super) appointment: AppointmentId,
}

impl<S, N> CaseHarness<S, N>
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    N: Notifier + 'static,
{
    pub(super) fn book(&self, name: &str, visa: Option<&str>) -> Booked {
        self.directory
            .register_agent(&format!("Agent for {name}"))
            .expect("agent registered");
        let applicant = self
            .directory
            .register_applicant(NewApplicant {
                name: name.to_string(),
                email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
                national_id: Some("1712345678".to_string()),
            })
            .expect("applicant registered");
        if let Some(visa) = visa {
            self.directory
                .assign_visa_type(&applicant.id, visa)
                .expect("visa assigned");
        }
        let appointment = self
            .scheduling
            .allocate(&applicant.id, at(2024, 6, 10, 9, 0))
            .expect("appointment booked");
        Booked {
            applicant: applicant.id,
            appointment: appointment.id,
        }
    }

    /// Books a tourist-visa applicant, moves to the appointment and assigns the catalog.
    pub(super) fn on_appointment_day(&self) -> (Booked, Vec<Requirement>) {
        let booked = self.book("Lucia Perez", Some("tourist"));
        self.clock.set(at(2024, 6, 10, 9, 15));
        let requirements = self
            .casework
            .assign_from_catalog(&booked.applicant, &booked.appointment)
            .expect("requirements assigned");
        (booked, requirements)
    }

    pub(super) fn upload(&self, requirement: &Requirement, name: &str) -> DocumentVersion {
        self.casework
            .upload(&requirement.id, name, b"%PDF-1.4 scan")
            .expect("upload accepted")
    }
}

pub(super) fn named<'a>(requirements: &'a [Requirement], code: &str) -> &'a Requirement {
    requirements
        .iter()
        .find(|requirement| requirement.code == code)
        .expect("requirement assigned")
}

/// Notifier whose transport is down.
#[derive(Default)]
pub(super) struct OfflineNotifier;

impl Notifier for OfflineNotifier {
    fn notify(
        &self,
        recipient: &str,
        _kind: NotificationKind,
        _message: &str,
    ) -> Result<NotificationAck, NotifyError> {
        Err(NotifyError::Delivery {
            recipient: recipient.to_string(),
            reason: "smtp relay offline".to_string(),
        })
    }
}

/// Callback run by a test double the first time it is used after being armed.
pub(super) struct Hook {
    armed: AtomicBool,
    run: Box<dyn Fn() + Send + Sync>,
}

impl Hook {
    pub(super) fn new(run: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            armed: AtomicBool::new(false),
            run: Box::new(run),
        }
    }

    pub(super) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn fire(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            (self.run)();
        }
    }
}

/// Blob store that runs its hook inside `put`, before the bytes land.
pub(super) struct ReentrantBlobs {
    pub(super) inner: Arc<InMemoryBlobStore>,
    pub(super) hook: Hook,
}

impl BlobStore for ReentrantBlobs {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        self.hook.fire();
        self.inner.put(path, bytes)
    }
    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError> {
        self.inner.get(blob)
    }
    fn delete(&self, prefix_or_ref: &str) -> Result<usize, BlobError> {
        self.inner.delete(prefix_or_ref)
    }
}

/// Clock that runs its hook inside `now`.
pub(super) struct ReentrantClock {
    pub(super) inner: Arc<FixedClock>,
    pub(super) hook: Hook,
}

impl Clock for ReentrantClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.hook.fire();
        self.inner.now()
    }
}

/// Store whose upload commits fail once `fail_uploads` is set.
#[derive(Default)]
pub(super) struct FlakyStore {
    inner: InMemoryStore,
    pub(super) fail_uploads: AtomicBool,
}

impl DirectoryRepository for FlakyStore {
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

impl AppointmentRepository for FlakyStore {
    fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
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

impl CaseRepository for FlakyStore {
    fn insert_requirement(&self, requirement: Requirement) -> Result<Requirement, RepositoryError> {
        self.inner.insert_requirement(requirement)
    }
    fn fetch_requirement(&self, id: &RequirementId) -> Result<Option<Requirement>, RepositoryError> {
        self.inner.fetch_requirement(id)
    }
    fn requirements_for_applicant(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Vec<Requirement>, RepositoryError> {
        self.inner.requirements_for_applicant(applicant)
    }
    fn delete_requirement(&self, id: &RequirementId) -> Result<Requirement, RepositoryError> {
        self.inner.delete_requirement(id)
    }
    fn versions(&self, requirement: &RequirementId) -> Result<Vec<DocumentVersion>, RepositoryError> {
        self.inner.versions(requirement)
    }
    fn fetch_version(&self, id: &DocumentId) -> Result<Option<DocumentVersion>, RepositoryError> {
        self.inner.fetch_version(id)
    }
    fn commit_upload(
        &self,
        requirement: Requirement,
        version: DocumentVersion,
    ) -> Result<DocumentVersion, RepositoryError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Conflict(Constraint::UploadGate));
        }
        self.inner.commit_upload(requirement, version)
    }
    fn commit_review(
        &self,
        version: DocumentVersion,
        requirement: Requirement,
    ) -> Result<(), RepositoryError> {
        self.inner.commit_review(version, requirement)
    }
    fn insert_folder(&self, folder: CaseFolder) -> Result<CaseFolder, RepositoryError> {
        self.inner.insert_folder(folder)
    }
    fn fetch_folder(&self, applicant: &ApplicantId) -> Result<Option<CaseFolder>, RepositoryError> {
        self.inner.fetch_folder(applicant)
    }
    fn transition_folder(
        &self,
        expected: FolderState,
        folder: CaseFolder,
    ) -> Result<(), RepositoryError> {
        self.inner.transition_folder(expected, folder)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
