//! Per-requirement version chain and the upload gate.
//!
//! A requirement accepts a new version only while uploads are enabled and its latest version
//! (if any) was rejected. Each accepted upload closes the gate until an agent reviews it:
//! rejection reopens the gate, approval closes it for good.

use chrono::{DateTime, FixedOffset};

use super::domain::{
    CaseRuleViolation, DocumentState, DocumentVersion, Requirement, RequirementState,
    UploadStatus,
};

/// Why a requirement refuses a new upload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadBlock {
    #[error("'{requirement}' already has version {version} pending review; wait for the review before uploading again")]
    PendingReview { requirement: String, version: u32 },
    #[error("'{requirement}' was already reviewed and approved; no more versions are accepted")]
    AlreadyApproved { requirement: String },
    #[error("uploads are disabled for '{requirement}'")]
    Disabled { requirement: String },
}

/// Returns the version number the next upload will receive.
pub fn next_version(
    requirement: &Requirement,
    latest: Option<&DocumentVersion>,
) -> Result<u32, UploadBlock> {
    match latest.map(|version| (version.state, version.version)) {
        Some((DocumentState::PendingReview, version)) => Err(UploadBlock::PendingReview {
            requirement: requirement.name.clone(),
            version,
        }),
        Some((DocumentState::Approved, _)) => Err(UploadBlock::AlreadyApproved {
            requirement: requirement.name.clone(),
        }),
        _ if !requirement.upload_enabled => Err(UploadBlock::Disabled {
            requirement: requirement.name.clone(),
        }),
        Some((DocumentState::Missing, version)) => Ok(version + 1),
        None => Ok(1),
    }
}

/// Non-failing view of the upload gate.
pub fn upload_status(requirement: &Requirement, latest: Option<&DocumentVersion>) -> UploadStatus {
    match next_version(requirement, latest) {
        Ok(version) => UploadStatus {
            allowed: true,
            next_version: Some(version),
            reason: if version == 1 {
                "no previous versions".to_string()
            } else {
                format!("version {} was rejected", version - 1)
            },
        },
        Err(block) => UploadStatus {
            allowed: false,
            next_version: None,
            reason: block.to_string(),
        },
    }
}

/// Closes the gate after a version is accepted for review.
pub fn apply_upload(requirement: &mut Requirement) {
    requirement.upload_enabled = false;
    requirement.state = RequirementState::PendingReview;
}

pub fn approve(
    version: &mut DocumentVersion,
    requirement: &mut Requirement,
    at: DateTime<FixedOffset>,
) -> Result<(), CaseRuleViolation> {
    ensure_pending(version)?;
    version.state = DocumentState::Approved;
    version.observations = None;
    version.reviewed_at = Some(at);

    requirement.upload_enabled = false;
    requirement.observations = None;
    requirement.state = RequirementState::from_latest(Some(version.state));
    Ok(())
}

pub fn reject(
    version: &mut DocumentVersion,
    requirement: &mut Requirement,
    reason: &str,
    at: DateTime<FixedOffset>,
) -> Result<(), CaseRuleViolation> {
    ensure_pending(version)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CaseRuleViolation::MissingRejectionReason);
    }

    version.state = DocumentState::Missing;
    version.observations = Some(reason.to_string());
    version.reviewed_at = Some(at);

    requirement.upload_enabled = true;
    requirement.observations = Some(reason.to_string());
    requirement.state = RequirementState::from_latest(Some(version.state));
    Ok(())
}

fn ensure_pending(version: &DocumentVersion) -> Result<(), CaseRuleViolation> {
    if version.state == DocumentState::PendingReview {
        Ok(())
    } else {
        Err(CaseRuleViolation::DocumentNotPending {
            version: version.version,
            state: version.state,
        })
    }
}
