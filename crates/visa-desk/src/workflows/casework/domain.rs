use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::blob::BlobRef;
use crate::workflows::directory::ApplicantId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequirementId(pub String);

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review state of a single uploaded version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    PendingReview,
    Approved,
    /// Rejected by an agent; a new version may be uploaded.
    Missing,
}

impl DocumentState {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentState::PendingReview => "pending_review",
            DocumentState::Approved => "approved",
            DocumentState::Missing => "missing",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aggregate state of a requirement, derived from its latest version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementState {
    Missing,
    PendingReview,
    Approved,
}

impl RequirementState {
    pub fn from_latest(latest: Option<DocumentState>) -> Self {
        match latest {
            None | Some(DocumentState::Missing) => RequirementState::Missing,
            Some(DocumentState::PendingReview) => RequirementState::PendingReview,
            Some(DocumentState::Approved) => RequirementState::Approved,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RequirementState::Missing => "missing",
            RequirementState::PendingReview => "pending_review",
            RequirementState::Approved => "approved",
        }
    }
}

/// A document type one applicant must supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub applicant: ApplicantId,
    /// Catalog code of the requirement type.
    pub code: String,
    pub name: String,
    pub state: RequirementState,
    pub upload_enabled: bool,
    pub observations: Option<String>,
}

impl Requirement {
    pub fn missing(id: RequirementId, applicant: ApplicantId, code: String, name: String) -> Self {
        Self {
            id,
            applicant,
            code,
            name,
            state: RequirementState::Missing,
            upload_enabled: true,
            observations: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.state == RequirementState::Approved
    }
}

/// One uploaded attempt at satisfying a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: DocumentId,
    pub requirement: RequirementId,
    /// Starts at 1 and increases without gaps.
    pub version: u32,
    pub state: DocumentState,
    pub blob: BlobRef,
    pub original_name: String,
    pub content_type: String,
    pub observations: Option<String>,
    pub uploaded_at: DateTime<FixedOffset>,
    pub reviewed_at: Option<DateTime<FixedOffset>>,
}

/// Disposition of an applicant's case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderState {
    Open,
    Approved,
    ClosedAccepted,
    ClosedRejected,
}

impl FolderState {
    pub const fn label(self) -> &'static str {
        match self {
            FolderState::Open => "open",
            FolderState::Approved => "approved",
            FolderState::ClosedAccepted => "closed_accepted",
            FolderState::ClosedRejected => "closed_rejected",
        }
    }

    pub const fn is_closed(self) -> bool {
        matches!(self, FolderState::ClosedAccepted | FolderState::ClosedRejected)
    }
}

impl fmt::Display for FolderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result handed down by the issuing authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalOutcome {
    Accepted,
    Rejected,
}

/// Aggregate record of an applicant's requirements and case disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFolder {
    pub applicant: ApplicantId,
    pub state: FolderState,
    /// Rejection reason recorded with a `rejected` final result.
    pub observations: Option<String>,
    pub opened_at: DateTime<FixedOffset>,
    pub closed_at: Option<DateTime<FixedOffset>>,
}

/// Progress snapshot exposed to agents and applicants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub applicant_id: ApplicantId,
    pub state: &'static str,
    pub progress: u8,
    pub approved: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

/// Answer to "may this requirement receive a new upload right now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadStatus {
    pub allowed: bool,
    pub next_version: Option<u32>,
    pub reason: String,
}

/// Business-rule violations raised by the casework transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseRuleViolation {
    #[error("applicant {0} has no visa type assigned")]
    MissingVisaType(ApplicantId),
    #[error("applicant {0} has no pending appointment; book one before assigning requirements")]
    NoPendingAppointment(ApplicantId),
    #[error("requirements can only be assigned on the appointment day ({scheduled})")]
    NotAppointmentDay { scheduled: chrono::NaiveDate },
    #[error("requirement '{0}' is already assigned")]
    RequirementAlreadyAssigned(String),
    #[error("requirement '{0}' already has uploaded versions and cannot be removed")]
    RequirementHasVersions(String),
    #[error("a rejection needs a reason for the applicant")]
    MissingRejectionReason,
    #[error("only documents pending review can be reviewed; version {version} is {state}")]
    DocumentNotPending { version: u32, state: DocumentState },
    #[error("the case folder is {0} and can no longer change")]
    FolderClosed(FolderState),
    #[error("a final result can only be recorded on an approved folder; this one is {0}")]
    FolderNotApproved(FolderState),
}
