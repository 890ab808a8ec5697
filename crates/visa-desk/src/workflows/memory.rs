use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, FixedOffset};

use super::casework::domain::{
    CaseFolder, DocumentId, DocumentState, DocumentVersion, FolderState, Requirement,
    RequirementId,
};
use super::casework::folder::all_approved;
use super::casework::repository::CaseRepository;
use super::directory::domain::sort_agents;
use super::directory::{Agent, AgentId, Applicant, ApplicantId, DirectoryRepository};
use super::persistence::{Constraint, RepositoryError};
use super::scheduling::{Appointment, AppointmentId, AppointmentRepository, AppointmentStatus};

/// Process-local store backing every repository trait.
///
/// One mutex guards all tables, so each check-and-write below is atomic with respect to
/// every other call.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    applicants: BTreeMap<ApplicantId, Applicant>,
    agents: BTreeMap<AgentId, Agent>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    requirements: Vec<Requirement>,
    versions: BTreeMap<RequirementId, Vec<DocumentVersion>>,
    folders: BTreeMap<ApplicantId, CaseFolder>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;
        apply(&mut state)
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl StoreState {
    fn slot_taken(
        &self,
        agent: &AgentId,
        start: DateTime<FixedOffset>,
        ignore: Option<&AppointmentId>,
    ) -> bool {
        self.appointments.values().any(|existing| {
            Some(&existing.id) != ignore && &existing.agent == agent && existing.start == start
        })
    }

    fn requirement_mut(&mut self, id: &RequirementId) -> Result<&mut Requirement, RepositoryError> {
        self.requirements
            .iter_mut()
            .find(|requirement| &requirement.id == id)
            .ok_or(RepositoryError::NotFound)
    }

    fn ensure_folder_open(&self, applicant: &ApplicantId) -> Result<(), RepositoryError> {
        match self.folders.get(applicant) {
            Some(folder) if folder.state.is_closed() => {
                Err(RepositoryError::Conflict(Constraint::FolderClosed))
            }
            _ => Ok(()),
        }
    }

    /// Folder guard for writes that touch an existing requirement.
    fn ensure_requirement_open(&self, id: &RequirementId) -> Result<(), RepositoryError> {
        let applicant = self
            .requirements
            .iter()
            .find(|requirement| &requirement.id == id)
            .map(|requirement| requirement.applicant.clone())
            .ok_or(RepositoryError::NotFound)?;
        self.ensure_folder_open(&applicant)
    }

    fn pending_appointment_mut(
        &mut self,
        id: &AppointmentId,
    ) -> Result<&mut Appointment, RepositoryError> {
        let appointment = self
            .appointments
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if !appointment.is_pending() {
            return Err(RepositoryError::Conflict(Constraint::AppointmentPending));
        }
        Ok(appointment)
    }
}

impl DirectoryRepository for InMemoryStore {
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        self.with_state(|state| {
            if state
                .applicants
                .values()
                .any(|existing| same_name(&existing.name, &applicant.name))
            {
                return Err(RepositoryError::Conflict(Constraint::ApplicantName));
            }
            state
                .applicants
                .insert(applicant.id.clone(), applicant.clone());
            Ok(applicant)
        })
    }

    fn update_applicant(&self, applicant: Applicant) -> Result<(), RepositoryError> {
        self.with_state(|state| {
            if !state.applicants.contains_key(&applicant.id) {
                return Err(RepositoryError::NotFound);
            }
            if state.applicants.values().any(|existing| {
                existing.id != applicant.id && same_name(&existing.name, &applicant.name)
            }) {
                return Err(RepositoryError::Conflict(Constraint::ApplicantName));
            }
            state.applicants.insert(applicant.id.clone(), applicant);
            Ok(())
        })
    }

    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        self.with_state(|state| Ok(state.applicants.get(id).cloned()))
    }

    fn insert_agent(&self, agent: Agent) -> Result<Agent, RepositoryError> {
        self.with_state(|state| {
            if state
                .agents
                .values()
                .any(|existing| same_name(&existing.name, &agent.name))
            {
                return Err(RepositoryError::Conflict(Constraint::AgentName));
            }
            state.agents.insert(agent.id.clone(), agent.clone());
            Ok(agent)
        })
    }

    fn update_agent(&self, agent: Agent) -> Result<(), RepositoryError> {
        self.with_state(|state| match state.agents.get_mut(&agent.id) {
            Some(existing) => {
                *existing = agent;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    fn fetch_agent(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        self.with_state(|state| Ok(state.agents.get(id).cloned()))
    }

    fn agents(&self) -> Result<Vec<Agent>, RepositoryError> {
        self.with_state(|state| {
            let mut agents: Vec<Agent> = state.agents.values().cloned().collect();
            sort_agents(&mut agents);
            Ok(agents)
        })
    }
}

impl AppointmentRepository for InMemoryStore {
    fn insert_appointment(
        &self,
        appointment: Appointment,
    ) -> Result<Appointment, RepositoryError> {
        self.with_state(|state| {
            if state.slot_taken(&appointment.agent, appointment.start, None) {
                return Err(RepositoryError::Conflict(Constraint::AgentSlot));
            }
            if appointment.is_pending()
                && state.appointments.values().any(|existing| {
                    existing.applicant == appointment.applicant && existing.is_pending()
                })
            {
                return Err(RepositoryError::Conflict(
                    Constraint::ApplicantPendingAppointment,
                ));
            }
            state
                .appointments
                .insert(appointment.id.clone(), appointment.clone());
            Ok(appointment)
        })
    }

    fn update_appointment(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        self.with_state(|state| {
            state.pending_appointment_mut(&appointment.id)?;
            if state.slot_taken(&appointment.agent, appointment.start, Some(&appointment.id)) {
                return Err(RepositoryError::Conflict(Constraint::AgentSlot));
            }
            let stored = state.pending_appointment_mut(&appointment.id)?;
            stored.agent = appointment.agent;
            stored.start = appointment.start;
            stored.end = appointment.end;
            Ok(())
        })
    }

    fn set_appointment_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<(), RepositoryError> {
        self.with_state(|state| {
            state.pending_appointment_mut(id)?.status = status;
            Ok(())
        })
    }

    fn delete_appointment(&self, id: &AppointmentId) -> Result<Appointment, RepositoryError> {
        self.with_state(|state| state.appointments.remove(id).ok_or(RepositoryError::NotFound))
    }

    fn fetch_appointment(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        self.with_state(|state| Ok(state.appointments.get(id).cloned()))
    }

    fn pending_for_applicant(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        self.with_state(|state| {
            Ok(state
                .appointments
                .values()
                .find(|appointment| &appointment.applicant == applicant && appointment.is_pending())
                .cloned())
        })
    }

    fn agents_booked_at(
        &self,
        start: DateTime<FixedOffset>,
    ) -> Result<Vec<AgentId>, RepositoryError> {
        self.with_state(|state| {
            Ok(state
                .appointments
                .values()
                .filter(|appointment| appointment.start == start)
                .map(|appointment| appointment.agent.clone())
                .collect())
        })
    }

    fn pending_load(&self) -> Result<HashMap<AgentId, usize>, RepositoryError> {
        self.with_state(|state| {
            let mut load = HashMap::new();
            for appointment in state.appointments.values().filter(|a| a.is_pending()) {
                *load.entry(appointment.agent.clone()).or_insert(0) += 1;
            }
            Ok(load)
        })
    }

    fn appointments_for_agent(&self, agent: &AgentId) -> Result<Vec<Appointment>, RepositoryError> {
        self.with_state(|state| {
            Ok(state
                .appointments
                .values()
                .filter(|appointment| &appointment.agent == agent)
                .cloned()
                .collect())
        })
    }
}

impl CaseRepository for InMemoryStore {
    fn insert_requirement(&self, requirement: Requirement) -> Result<Requirement, RepositoryError> {
        self.with_state(|state| {
            state.ensure_folder_open(&requirement.applicant)?;
            if state.requirements.iter().any(|existing| {
                existing.applicant == requirement.applicant
                    && (existing.code == requirement.code
                        || same_name(&existing.name, &requirement.name))
            }) {
                return Err(RepositoryError::Conflict(
                    Constraint::RequirementPerApplicant,
                ));
            }
            state.requirements.push(requirement.clone());
            Ok(requirement)
        })
    }

    fn fetch_requirement(
        &self,
        id: &RequirementId,
    ) -> Result<Option<Requirement>, RepositoryError> {
        self.with_state(|state| {
            Ok(state
                .requirements
                .iter()
                .find(|requirement| &requirement.id == id)
                .cloned())
        })
    }

    fn requirements_for_applicant(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Vec<Requirement>, RepositoryError> {
        self.with_state(|state| {
            Ok(state
                .requirements
                .iter()
                .filter(|requirement| &requirement.applicant == applicant)
                .cloned()
                .collect())
        })
    }

    fn delete_requirement(&self, id: &RequirementId) -> Result<Requirement, RepositoryError> {
        self.with_state(|state| {
            let index = state
                .requirements
                .iter()
                .position(|requirement| &requirement.id == id)
                .ok_or(RepositoryError::NotFound)?;
            state.ensure_requirement_open(id)?;
            if state.versions.get(id).is_some_and(|versions| !versions.is_empty()) {
                return Err(RepositoryError::Conflict(Constraint::RequirementInUse));
            }
            Ok(state.requirements.remove(index))
        })
    }

    fn versions(
        &self,
        requirement: &RequirementId,
    ) -> Result<Vec<DocumentVersion>, RepositoryError> {
        self.with_state(|state| Ok(state.versions.get(requirement).cloned().unwrap_or_default()))
    }

    fn fetch_version(&self, id: &DocumentId) -> Result<Option<DocumentVersion>, RepositoryError> {
        self.with_state(|state| {
            Ok(state
                .versions
                .values()
                .flatten()
                .find(|version| &version.id == id)
                .cloned())
        })
    }

    fn commit_upload(
        &self,
        requirement: Requirement,
        version: DocumentVersion,
    ) -> Result<DocumentVersion, RepositoryError> {
        self.with_state(|state| {
            let id = requirement.id.clone();
            state.ensure_requirement_open(&id)?;
            let stored_enabled = state.requirement_mut(&id)?.upload_enabled;
            let chain = state.versions.entry(id.clone()).or_default();
            let latest = chain.last();

            let gate_open = stored_enabled
                && latest.map_or(true, |latest| latest.state == DocumentState::Missing);
            if !gate_open {
                return Err(RepositoryError::Conflict(Constraint::UploadGate));
            }
            let expected = latest.map_or(1, |latest| latest.version + 1);
            if version.version != expected {
                return Err(RepositoryError::Conflict(Constraint::VersionPerRequirement));
            }

            chain.push(version.clone());
            *state.requirement_mut(&id)? = requirement;
            Ok(version)
        })
    }

    fn commit_review(
        &self,
        version: DocumentVersion,
        requirement: Requirement,
    ) -> Result<(), RepositoryError> {
        self.with_state(|state| {
            let id = requirement.id.clone();
            state.ensure_requirement_open(&id)?;
            let stored = state
                .versions
                .get_mut(&version.requirement)
                .and_then(|chain| chain.iter_mut().find(|stored| stored.id == version.id))
                .ok_or(RepositoryError::NotFound)?;
            if stored.state != DocumentState::PendingReview {
                return Err(RepositoryError::Conflict(Constraint::ReviewState));
            }
            *stored = version;
            *state.requirement_mut(&id)? = requirement;
            Ok(())
        })
    }

    fn insert_folder(&self, folder: CaseFolder) -> Result<CaseFolder, RepositoryError> {
        self.with_state(|state| {
            if state.folders.contains_key(&folder.applicant) {
                return Err(RepositoryError::Conflict(Constraint::FolderPerApplicant));
            }
            state
                .folders
                .insert(folder.applicant.clone(), folder.clone());
            Ok(folder)
        })
    }

    fn fetch_folder(&self, applicant: &ApplicantId) -> Result<Option<CaseFolder>, RepositoryError> {
        self.with_state(|state| Ok(state.folders.get(applicant).cloned()))
    }

    fn transition_folder(
        &self,
        expected: FolderState,
        folder: CaseFolder,
    ) -> Result<(), RepositoryError> {
        self.with_state(|state| {
            let stored = state
                .folders
                .get(&folder.applicant)
                .ok_or(RepositoryError::NotFound)?;
            if stored.state != expected {
                return Err(RepositoryError::Conflict(Constraint::FolderState));
            }
            if folder.state != FolderState::Open {
                let held: Vec<Requirement> = state
                    .requirements
                    .iter()
                    .filter(|requirement| requirement.applicant == folder.applicant)
                    .cloned()
                    .collect();
                if !all_approved(&held) {
                    return Err(RepositoryError::Conflict(Constraint::FolderState));
                }
            }
            state.folders.insert(folder.applicant.clone(), folder);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::casework::blob::BlobRef;
    use crate::workflows::casework::domain::RequirementState;
    use chrono::Duration;

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-10T09:00:00-05:00").expect("valid")
    }

    fn appointment(id: &str, applicant: &str, agent: &str) -> Appointment {
        Appointment::pending(
            AppointmentId(id.to_string()),
            ApplicantId(applicant.to_string()),
            AgentId(agent.to_string()),
            start(),
            Duration::hours(1),
        )
    }

    fn requirement() -> Requirement {
        Requirement::missing(
            RequirementId("req-1".to_string()),
            ApplicantId("applicant-1".to_string()),
            "passport".to_string(),
            "Passport".to_string(),
        )
    }

    fn version(number: u32) -> DocumentVersion {
        DocumentVersion {
            id: DocumentId(format!("doc-{number}")),
            requirement: RequirementId("req-1".to_string()),
            version: number,
            state: DocumentState::PendingReview,
            blob: BlobRef(format!("applicant-1/student/Passport/v{number}_p.pdf")),
            original_name: "p.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            observations: None,
            uploaded_at: start(),
            reviewed_at: None,
        }
    }

    #[test]
    fn agent_slot_is_unique_across_applicants() {
        let store = InMemoryStore::new();
        store
            .insert_appointment(appointment("appt-1", "applicant-1", "agent-1"))
            .expect("first booking");
        assert_eq!(
            store.insert_appointment(appointment("appt-2", "applicant-2", "agent-1")),
            Err(RepositoryError::Conflict(Constraint::AgentSlot))
        );
        store
            .insert_appointment(appointment("appt-3", "applicant-2", "agent-2"))
            .expect("other agent is free");
        assert_eq!(store.agents_booked_at(start()).expect("booked").len(), 2);
    }

    #[test]
    fn one_pending_appointment_per_applicant() {
        let store = InMemoryStore::new();
        store
            .insert_appointment(appointment("appt-1", "applicant-1", "agent-1"))
            .expect("first booking");
        let mut later = appointment("appt-2", "applicant-1", "agent-2");
        later.start = start() + Duration::days(1);
        assert_eq!(
            store.insert_appointment(later.clone()),
            Err(RepositoryError::Conflict(Constraint::ApplicantPendingAppointment))
        );

        store
            .set_appointment_status(
                &AppointmentId("appt-1".to_string()),
                AppointmentStatus::Successful,
            )
            .expect("completed");
        store.insert_appointment(later).expect("no pending left");
    }

    #[test]
    fn only_pending_appointments_move_or_change_status() {
        let store = InMemoryStore::new();
        let booked = store
            .insert_appointment(appointment("appt-1", "applicant-1", "agent-1"))
            .expect("booked");
        store
            .set_appointment_status(&booked.id, AppointmentStatus::Successful)
            .expect("completed");

        let mut stale = booked.clone();
        stale.move_to(
            AgentId("agent-2".to_string()),
            start() + Duration::days(1),
            Duration::hours(1),
        );
        assert_eq!(
            store.update_appointment(stale),
            Err(RepositoryError::Conflict(Constraint::AppointmentPending))
        );
        assert_eq!(
            store.set_appointment_status(&booked.id, AppointmentStatus::Failed),
            Err(RepositoryError::Conflict(Constraint::AppointmentPending))
        );

        let stored = store
            .fetch_appointment(&booked.id)
            .expect("fetched")
            .expect("present");
        assert_eq!(stored.status, AppointmentStatus::Successful);
        assert_eq!(stored.agent, booked.agent);
        assert_eq!(stored.start, start());
    }

    #[test]
    fn moving_an_appointment_keeps_its_stored_status() {
        let store = InMemoryStore::new();
        let booked = store
            .insert_appointment(appointment("appt-1", "applicant-1", "agent-1"))
            .expect("booked");

        let mut moved = booked.clone();
        moved.status = AppointmentStatus::Cancelled;
        moved.move_to(
            AgentId("agent-2".to_string()),
            start() + Duration::days(1),
            Duration::hours(1),
        );
        store.update_appointment(moved.clone()).expect("moved");

        let stored = store
            .fetch_appointment(&booked.id)
            .expect("fetched")
            .expect("present");
        assert_eq!(stored.status, AppointmentStatus::Pending);
        assert_eq!(stored.agent, moved.agent);
        assert_eq!((stored.start, stored.end), (moved.start, moved.end));
    }

    #[test]
    fn folder_transitions_compare_state_and_requirements() {
        let store = InMemoryStore::new();
        let applicant = ApplicantId("applicant-1".to_string());
        let mut passport = store.insert_requirement(requirement()).expect("inserted");
        store
            .commit_upload(passport.clone(), version(1))
            .expect("uploaded");
        store
            .insert_folder(CaseFolder::open(applicant.clone(), start()))
            .expect("opened");

        let mut approved = CaseFolder::open(applicant, start());
        approved.state = FolderState::Approved;
        assert_eq!(
            store.transition_folder(FolderState::Open, approved.clone()),
            Err(RepositoryError::Conflict(Constraint::FolderState))
        );

        let mut reviewed = version(1);
        reviewed.state = DocumentState::Approved;
        passport.state = RequirementState::Approved;
        passport.upload_enabled = false;
        store
            .commit_review(reviewed, passport.clone())
            .expect("reviewed");
        store
            .transition_folder(FolderState::Open, approved.clone())
            .expect("approved folder");
        assert_eq!(
            store.transition_folder(FolderState::Open, approved.clone()),
            Err(RepositoryError::Conflict(Constraint::FolderState))
        );

        let mut closed = approved;
        closed.state = FolderState::ClosedAccepted;
        store
            .transition_folder(FolderState::Approved, closed)
            .expect("closed");

        let mut late = requirement();
        late.id = RequirementId("req-2".to_string());
        late.code = "bank_statement".to_string();
        late.name = "Bank statement".to_string();
        assert_eq!(
            store.insert_requirement(late),
            Err(RepositoryError::Conflict(Constraint::FolderClosed))
        );
        assert_eq!(
            store.commit_upload(passport.clone(), version(2)),
            Err(RepositoryError::Conflict(Constraint::FolderClosed))
        );
        assert_eq!(
            store.delete_requirement(&passport.id),
            Err(RepositoryError::Conflict(Constraint::FolderClosed))
        );
    }

    #[test]
    fn upload_commit_enforces_gate_and_sequence() {
        let store = InMemoryStore::new();
        let mut requirement = store.insert_requirement(requirement()).expect("inserted");

        assert_eq!(
            store.commit_upload(requirement.clone(), version(2)),
            Err(RepositoryError::Conflict(Constraint::VersionPerRequirement))
        );

        requirement.upload_enabled = false;
        store
            .commit_upload(requirement.clone(), version(1))
            .expect("first version");
        assert_eq!(
            store.commit_upload(requirement.clone(), version(2)),
            Err(RepositoryError::Conflict(Constraint::UploadGate))
        );
        assert_eq!(
            store.delete_requirement(&requirement.id),
            Err(RepositoryError::Conflict(Constraint::RequirementInUse))
        );
    }

    #[test]
    fn review_commit_requires_pending_version() {
        let store = InMemoryStore::new();
        let requirement = store.insert_requirement(requirement()).expect("inserted");
        store
            .commit_upload(requirement.clone(), version(1))
            .expect("uploaded");

        let mut approved = version(1);
        approved.state = DocumentState::Approved;
        store
            .commit_review(approved.clone(), requirement.clone())
            .expect("first review");
        assert_eq!(
            store.commit_review(approved, requirement),
            Err(RepositoryError::Conflict(Constraint::ReviewState))
        );
    }

    #[test]
    fn requirement_names_are_unique_per_applicant() {
        let store = InMemoryStore::new();
        store.insert_requirement(requirement()).expect("inserted");
        let mut duplicate = requirement();
        duplicate.id = RequirementId("req-2".to_string());
        duplicate.code = "passport_copy".to_string();
        assert_eq!(
            store.insert_requirement(duplicate.clone()),
            Err(RepositoryError::Conflict(Constraint::RequirementPerApplicant))
        );

        duplicate.applicant = ApplicantId("applicant-2".to_string());
        store.insert_requirement(duplicate).expect("other applicant");
    }
}
