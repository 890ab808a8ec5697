use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Storage-level uniqueness and gating rules every repository must enforce atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    ApplicantName,
    AgentName,
    /// At most one appointment per (agent, start).
    AgentSlot,
    /// At most one pending appointment per applicant.
    ApplicantPendingAppointment,
    /// One requirement per (applicant, name).
    RequirementPerApplicant,
    /// One document version per (requirement, version).
    VersionPerRequirement,
    FolderPerApplicant,
    /// The stored requirement no longer accepts uploads.
    UploadGate,
    /// The stored document version is no longer pending review.
    ReviewState,
    /// A requirement with versions cannot be deleted.
    RequirementInUse,
    /// The stored appointment is no longer pending.
    AppointmentPending,
    /// The stored case folder moved since it was read, or the requirements do not back
    /// the new state.
    FolderState,
    /// The applicant's case folder is closed.
    FolderClosed,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Constraint::ApplicantName => "unique applicant name",
            Constraint::AgentName => "unique agent name",
            Constraint::AgentSlot => "unique (agent, start)",
            Constraint::ApplicantPendingAppointment => "one pending appointment per applicant",
            Constraint::RequirementPerApplicant => "unique (applicant, requirement)",
            Constraint::VersionPerRequirement => "unique (requirement, version)",
            Constraint::FolderPerApplicant => "one case folder per applicant",
            Constraint::UploadGate => "requirement upload gate",
            Constraint::ReviewState => "document pending review",
            Constraint::RequirementInUse => "requirement has document versions",
            Constraint::AppointmentPending => "appointment still pending",
            Constraint::FolderState => "case folder state unchanged since read",
            Constraint::FolderClosed => "case folder open",
        };
        f.write_str(label)
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage constraint violated: {0}")]
    Conflict(Constraint),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Process-wide identifier generator, e.g. `appt-000042`.
pub(crate) struct Sequence {
    prefix: &'static str,
    next: AtomicU64,
}

impl Sequence {
    pub(crate) const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub(crate) fn next(&self) -> String {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{id:06}", self.prefix)
    }
}
