use std::sync::Arc;

use tracing::info;

use super::domain::{Agent, AgentId, Applicant, ApplicantId, NewApplicant};
use super::repository::DirectoryRepository;
use crate::error::ErrorKind;
use crate::workflows::casework::catalog::{CatalogError, RequirementCatalog};
use crate::workflows::persistence::{RepositoryError, Sequence};

static APPLICANT_SEQUENCE: Sequence = Sequence::new("applicant");
static AGENT_SEQUENCE: Sequence = Sequence::new("agent");

/// Registration and administration of applicants and agents.
pub struct DirectoryService<S, K> {
    store: Arc<S>,
    catalog: Arc<K>,
}

impl<S, K> DirectoryService<S, K>
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    pub fn new(store: Arc<S>, catalog: Arc<K>) -> Self {
        Self { store, catalog }
    }

    pub fn register_applicant(&self, intake: NewApplicant) -> Result<Applicant, DirectoryError> {
        let name = intake.name.trim().to_string();
        if name.is_empty() {
            return Err(DirectoryError::MissingField("name"));
        }

        let applicant = Applicant {
            id: ApplicantId(APPLICANT_SEQUENCE.next()),
            name,
            email: trimmed(intake.email),
            national_id: trimmed(intake.national_id),
            visa_type: None,
        };
        let stored = self.store.insert_applicant(applicant)?;
        info!(applicant = %stored.id, "applicant registered");
        Ok(stored)
    }

    pub fn applicant(&self, id: &ApplicantId) -> Result<Applicant, DirectoryError> {
        self.store
            .fetch_applicant(id)?
            .ok_or_else(|| DirectoryError::NotFound {
                entity: "applicant",
                id: id.0.clone(),
            })
    }

    /// Records the visa type driving which requirements apply.
    pub fn assign_visa_type(
        &self,
        id: &ApplicantId,
        visa_code: &str,
    ) -> Result<Applicant, DirectoryError> {
        let mut applicant = self.applicant(id)?;
        let visa = self
            .catalog
            .visa_type(visa_code)
            .filter(|visa| visa.active)
            .ok_or_else(|| CatalogError::UnknownVisaType(visa_code.to_string()))?;

        applicant.visa_type = Some(visa.code);
        self.store.update_applicant(applicant.clone())?;
        info!(applicant = %applicant.id, visa = ?applicant.visa_type, "visa type assigned");
        Ok(applicant)
    }

    pub fn set_national_id(
        &self,
        id: &ApplicantId,
        national_id: &str,
    ) -> Result<Applicant, DirectoryError> {
        let national_id = national_id.trim();
        if national_id.is_empty() {
            return Err(DirectoryError::MissingField("national_id"));
        }
        let mut applicant = self.applicant(id)?;
        applicant.national_id = Some(national_id.to_string());
        self.store.update_applicant(applicant.clone())?;
        Ok(applicant)
    }

    pub fn register_agent(&self, name: &str) -> Result<Agent, DirectoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::MissingField("name"));
        }
        let agent = Agent {
            id: AgentId(AGENT_SEQUENCE.next()),
            name: name.to_string(),
            active: true,
        };
        let stored = self.store.insert_agent(agent)?;
        info!(agent = %stored.id, name = %stored.name, "agent registered");
        Ok(stored)
    }

    pub fn activate_agent(&self, id: &AgentId) -> Result<Agent, DirectoryError> {
        self.set_agent_active(id, true)
    }

    /// Inactive agents are never selected for new or reprogrammed appointments.
    pub fn deactivate_agent(&self, id: &AgentId) -> Result<Agent, DirectoryError> {
        self.set_agent_active(id, false)
    }

    pub fn active_agents(&self) -> Result<Vec<Agent>, DirectoryError> {
        Ok(self
            .store
            .agents()?
            .into_iter()
            .filter(|agent| agent.active)
            .collect())
    }

    fn set_agent_active(&self, id: &AgentId, active: bool) -> Result<Agent, DirectoryError> {
        let mut agent = self
            .store
            .fetch_agent(id)?
            .ok_or_else(|| DirectoryError::NotFound {
                entity: "agent",
                id: id.0.clone(),
            })?;

        if agent.active == active {
            return Err(DirectoryError::AgentUnchanged {
                name: agent.name,
                state: if active { "active" } else { "inactive" },
            });
        }

        agent.active = active;
        self.store.update_agent(agent.clone())?;
        info!(agent = %agent.id, active, "agent status changed");
        Ok(agent)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Error raised by the directory service.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("agent '{name}' is already {state}")]
    AgentUnchanged { name: String, state: &'static str },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DirectoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::MissingField(_) | DirectoryError::AgentUnchanged { .. } => {
                ErrorKind::Validation
            }
            DirectoryError::NotFound { .. } => ErrorKind::NotFound,
            DirectoryError::Catalog(err) => err.kind(),
            DirectoryError::Repository(err) => repository_kind(err),
        }
    }
}

/// Shared mapping from storage failures onto caller-facing kinds.
pub(crate) fn repository_kind(err: &RepositoryError) -> ErrorKind {
    match err {
        RepositoryError::Conflict(_) => ErrorKind::Conflict,
        RepositoryError::NotFound => ErrorKind::NotFound,
        RepositoryError::Unavailable(_) => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::casework::catalog::StaticCatalog;
    use crate::workflows::persistence::Constraint;
    use crate::workflows::InMemoryStore;

    fn service() -> DirectoryService<InMemoryStore, StaticCatalog> {
        DirectoryService::new(
            Arc::new(InMemoryStore::default()),
            Arc::new(StaticCatalog::standard()),
        )
    }

    #[test]
    fn registers_applicant_with_trimmed_fields() {
        let service = service();
        let applicant = service
            .register_applicant(NewApplicant {
                name: "  Lucía Pérez ".to_string(),
                email: Some("  ".to_string()),
                national_id: Some("1712345678".to_string()),
            })
            .expect("applicant registered");

        assert_eq!(applicant.name, "Lucía Pérez");
        assert!(applicant.email.is_none());
        assert_eq!(applicant.contact(), "Lucía Pérez");
        assert_eq!(applicant.storage_owner(), "1712345678");
    }

    #[test]
    fn duplicate_applicant_name_is_a_storage_conflict() {
        let service = service();
        let intake = NewApplicant {
            name: "Marco Vidal".to_string(),
            ..NewApplicant::default()
        };
        service
            .register_applicant(intake.clone())
            .expect("first registration");
        match service.register_applicant(intake) {
            Err(DirectoryError::Repository(RepositoryError::Conflict(
                Constraint::ApplicantName,
            ))) => {}
            other => panic!("expected name conflict, got {other:?}"),
        }
    }

    #[test]
    fn assign_visa_type_rejects_unknown_codes() {
        let service = service();
        let applicant = service
            .register_applicant(NewApplicant {
                name: "Ana Ruiz".to_string(),
                ..NewApplicant::default()
            })
            .expect("registered");

        let err = service
            .assign_visa_type(&applicant.id, "diplomatic")
            .expect_err("unknown visa type");
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let updated = service
            .assign_visa_type(&applicant.id, "student")
            .expect("student visa exists");
        assert_eq!(updated.visa_type.as_deref(), Some("student"));
    }

    #[test]
    fn toggling_agent_state_twice_is_rejected() {
        let service = service();
        let agent = service.register_agent("Beatriz").expect("agent registered");

        let inactive = service.deactivate_agent(&agent.id).expect("deactivated");
        assert!(!inactive.active);
        assert!(service.active_agents().expect("list").is_empty());

        match service.deactivate_agent(&agent.id) {
            Err(DirectoryError::AgentUnchanged { state, .. }) => assert_eq!(state, "inactive"),
            other => panic!("expected unchanged error, got {other:?}"),
        }

        service.activate_agent(&agent.id).expect("reactivated");
        assert_eq!(service.active_agents().expect("list").len(), 1);
    }
}
