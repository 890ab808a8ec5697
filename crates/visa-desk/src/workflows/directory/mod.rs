//! Applicants and agents known to the agency.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{Agent, AgentId, Applicant, ApplicantId, NewApplicant};
pub use repository::DirectoryRepository;
pub use router::directory_router;
pub use service::{DirectoryError, DirectoryService};
