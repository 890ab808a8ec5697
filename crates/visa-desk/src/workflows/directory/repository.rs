use super::domain::{Agent, AgentId, Applicant, ApplicantId};
use crate::workflows::persistence::RepositoryError;

/// Storage abstraction for applicants and agents.
pub trait DirectoryRepository: Send + Sync {
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError>;
    fn update_applicant(&self, applicant: Applicant) -> Result<(), RepositoryError>;
    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError>;
    fn insert_agent(&self, agent: Agent) -> Result<Agent, RepositoryError>;
    fn update_agent(&self, agent: Agent) -> Result<(), RepositoryError>;
    fn fetch_agent(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError>;
    /// Every agent, ordered by name then id.
    fn agents(&self) -> Result<Vec<Agent>, RepositoryError>;
}
